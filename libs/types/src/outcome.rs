//! Match outcomes and box scores
//!
//! The box score is the hand-off record from the live match engine to
//! post-match settlement.

use crate::ids::{MatchId, PlayerId};
use crate::mode::{GameMode, MatchType, Side};
use serde::{Deserialize, Serialize};

/// Why a side won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    Score,
    Accuracy,
    Speed,
    Streak,
    Correct,
    Forfeit,
    QuitVote,
    Abandonment,
    Integrity,
}

impl WinReason {
    /// Whether the loser gave up or was removed rather than outscored
    pub fn is_forfeit(&self) -> bool {
        matches!(
            self,
            WinReason::Forfeit | WinReason::QuitVote | WinReason::Abandonment | WinReason::Integrity
        )
    }
}

/// Final result of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchOutcome {
    Winner { side: Side, reason: WinReason },
    Draw,
    Voided { reason: String },
}

impl MatchOutcome {
    /// Actual score for the given side: 1 win, 0.5 draw, 0 loss
    pub fn actual_for(&self, side: Side) -> Option<f64> {
        match self {
            MatchOutcome::Winner { side: winner, .. } => {
                Some(if *winner == side { 1.0 } else { 0.0 })
            }
            MatchOutcome::Draw => Some(0.5),
            MatchOutcome::Voided { .. } => None,
        }
    }

    pub fn is_voided(&self) -> bool {
        matches!(self, MatchOutcome::Voided { .. })
    }
}

/// Per-player line of the box score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLine {
    pub player_id: PlayerId,
    pub display_name: String,
    pub side: Side,
    pub is_bot: bool,
    pub rating_at_start: i32,
    pub score: u32,
    pub correct: u32,
    pub answered: u32,
    pub best_streak: u32,
    pub total_latency_ms: u64,
}

impl PlayerLine {
    pub fn accuracy(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f64 / self.answered as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.answered as f64
        }
    }
}

/// Aggregated team line used by the tiebreak cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamLine {
    pub side: Side,
    pub score: u32,
    /// correct / answered, 0.0 when nothing was answered
    pub accuracy: f64,
    /// Mean answer latency in milliseconds, 0.0 when nothing was answered
    pub avg_latency_ms: f64,
    pub max_streak: u32,
    pub correct: u32,
}

impl TeamLine {
    /// Aggregate the given side's player lines
    pub fn from_players(side: Side, players: &[PlayerLine]) -> Self {
        let lines = players.iter().filter(|p| p.side == side);
        let mut score = 0u32;
        let mut correct = 0u32;
        let mut answered = 0u32;
        let mut latency = 0u64;
        let mut max_streak = 0u32;
        for line in lines {
            score += line.score;
            correct += line.correct;
            answered += line.answered;
            latency += line.total_latency_ms;
            max_streak = max_streak.max(line.best_streak);
        }
        let (accuracy, avg_latency_ms) = if answered == 0 {
            (0.0, 0.0)
        } else {
            (
                correct as f64 / answered as f64,
                latency as f64 / answered as f64,
            )
        };
        Self {
            side,
            score,
            accuracy,
            avg_latency_ms,
            max_streak,
            correct,
        }
    }
}

/// Complete result of a concluded match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScore {
    pub match_id: MatchId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub outcome: MatchOutcome,
    pub teams: [TeamLine; 2],
    pub players: Vec<PlayerLine>,
    pub duration_ms: i64,
}

impl BoxScore {
    pub fn team(&self, side: Side) -> &TeamLine {
        &self.teams[side.index()]
    }

    pub fn players_on(&self, side: Side) -> impl Iterator<Item = &PlayerLine> {
        self.players.iter().filter(move |p| p.side == side)
    }

    pub fn humans(&self) -> impl Iterator<Item = &PlayerLine> {
        self.players.iter().filter(|p| !p.is_bot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(side: Side, score: u32, correct: u32, answered: u32, streak: u32, latency: u64) -> PlayerLine {
        PlayerLine {
            player_id: PlayerId::new(),
            display_name: "p".to_string(),
            side,
            is_bot: false,
            rating_at_start: 1200,
            score,
            correct,
            answered,
            best_streak: streak,
            total_latency_ms: latency,
        }
    }

    #[test]
    fn test_team_line_aggregation() {
        let players = vec![
            line(Side::A, 500, 5, 5, 5, 10_000),
            line(Side::A, 300, 3, 5, 2, 15_000),
            line(Side::B, 900, 9, 10, 9, 20_000),
        ];
        let team = TeamLine::from_players(Side::A, &players);
        assert_eq!(team.score, 800);
        assert_eq!(team.correct, 8);
        assert!((team.accuracy - 0.8).abs() < 1e-9);
        assert!((team.avg_latency_ms - 2500.0).abs() < 1e-9);
        assert_eq!(team.max_streak, 5);
    }

    #[test]
    fn test_team_line_empty_side() {
        let team = TeamLine::from_players(Side::B, &[]);
        assert_eq!(team.score, 0);
        assert_eq!(team.accuracy, 0.0);
    }

    #[test]
    fn test_outcome_actual_scores() {
        let win = MatchOutcome::Winner { side: Side::A, reason: WinReason::Score };
        assert_eq!(win.actual_for(Side::A), Some(1.0));
        assert_eq!(win.actual_for(Side::B), Some(0.0));
        assert_eq!(MatchOutcome::Draw.actual_for(Side::B), Some(0.5));
        let void = MatchOutcome::Voided { reason: "integrity".into() };
        assert!(void.actual_for(Side::A).is_none());
        assert!(void.is_voided());
    }

    #[test]
    fn test_player_line_ratios() {
        let l = line(Side::A, 0, 0, 0, 0, 0);
        assert_eq!(l.accuracy(), 0.0);
        assert_eq!(l.avg_latency_ms(), 0.0);
        let l = line(Side::A, 300, 3, 4, 3, 8_000);
        assert!((l.accuracy() - 0.75).abs() < 1e-9);
        assert!((l.avg_latency_ms() - 2000.0).abs() < 1e-9);
    }
}

//! Durable records and notification intents produced by settlement

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::ids::{MatchId, PlayerId};
use types::mode::{GameMode, MatchType, Side};
use types::outcome::{MatchOutcome, PlayerLine, WinReason};

/// Rating change of one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub player_id: PlayerId,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
}

/// Result of a match from one player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryResult {
    Win,
    Loss,
    Draw,
    Voided,
}

impl HistoryResult {
    pub fn for_side(outcome: &MatchOutcome, side: Side) -> Self {
        match outcome {
            MatchOutcome::Winner { side: winner, .. } if *winner == side => HistoryResult::Win,
            MatchOutcome::Winner { .. } => HistoryResult::Loss,
            MatchOutcome::Draw => HistoryResult::Draw,
            MatchOutcome::Voided { .. } => HistoryResult::Voided,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryResult::Win => "win",
            HistoryResult::Loss => "loss",
            HistoryResult::Draw => "draw",
            HistoryResult::Voided => "voided",
        }
    }
}

/// Append-only match history line, one per human participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryRow {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub side: Side,
    pub result: HistoryResult,
    pub win_reason: Option<WinReason>,
    pub score: u32,
    pub correct: u32,
    pub answered: u32,
    pub best_streak: u32,
    pub avg_latency_ms: f64,
    pub rating_before: i32,
    pub rating_after: i32,
    pub delta: i32,
    pub duration_ms: i64,
    pub settled_at: DateTime<Utc>,
}

impl MatchHistoryRow {
    pub(crate) fn from_line(
        line: &PlayerLine,
        header: &HistoryHeader,
        outcome: &MatchOutcome,
        rating_before: i32,
        rating_after: i32,
    ) -> Self {
        let win_reason = match outcome {
            MatchOutcome::Winner { reason, .. } => Some(*reason),
            _ => None,
        };
        Self {
            match_id: header.match_id,
            player_id: line.player_id,
            mode: header.mode,
            match_type: header.match_type,
            side: line.side,
            result: HistoryResult::for_side(outcome, line.side),
            win_reason,
            score: line.score,
            correct: line.correct,
            answered: line.answered,
            best_streak: line.best_streak,
            avg_latency_ms: line.avg_latency_ms(),
            rating_before,
            rating_after,
            delta: rating_after - rating_before,
            duration_ms: header.duration_ms,
            settled_at: header.settled_at,
        }
    }
}

/// Fields shared by every history row of one match
#[derive(Debug, Clone, Copy)]
pub(crate) struct HistoryHeader {
    pub match_id: MatchId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub duration_ms: i64,
    pub settled_at: DateTime<Utc>,
}

pub const TEMPLATE_SETTLEMENT_COMPLETED: &str = "settlement.completed";
pub const TEMPLATE_RANK_CHANGED: &str = "rank.changed";
pub const TEMPLATE_DECAY_PHASE_CHANGED: &str = "decay.phase_changed";

/// Request for the notification service; content is formatted downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub user_id: PlayerId,
    pub template_key: String,
    pub params: BTreeMap<String, String>,
}

impl NotificationIntent {
    pub fn new(user_id: PlayerId, template_key: &str) -> Self {
        Self {
            user_id,
            template_key: template_key.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}

//! Per-player views of the match state
//!
//! A snapshot is what a (re)connecting player needs to rebuild their screen.
//! Answers never leave the server and the opposing team's quit vote and
//! strategy-phase assignment stay hidden.

use rules::relay::Takeover;
use serde::{Deserialize, Serialize};
use types::ids::{MatchId, PlayerId};
use types::mode::{GameMode, MatchType, Side};
use types::outcome::MatchOutcome;
use types::participant::{Cosmetics, PartyRole};
use types::question::{OperationCategory, QuestionView};

use crate::phase::Phase;
use crate::state::{ConnectionStatus, MatchState, PlayerMatchState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub display_name: String,
    pub side: Side,
    pub is_bot: bool,
    pub roles: Vec<PartyRole>,
    pub score: u32,
    pub correct: u32,
    pub answered: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub connection: ConnectionStatus,
    pub equipped: Option<Cosmetics>,
}

impl From<&PlayerMatchState> for PlayerView {
    fn from(p: &PlayerMatchState) -> Self {
        Self {
            player_id: p.id(),
            display_name: p.participant.display_name().to_string(),
            side: p.side,
            is_bot: p.is_bot(),
            roles: p.roles.clone(),
            score: p.score,
            correct: p.correct_count,
            answered: p.total_answered,
            current_streak: p.current_streak,
            best_streak: p.best_streak,
            connection: p.connection,
            equipped: p.participant.equipped().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitVoteView {
    pub initiator: PlayerId,
    pub yes: usize,
    pub no: usize,
    pub outstanding: usize,
    pub deadline: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamView {
    pub side: Side,
    pub score: u32,
    pub streak: u32,
    pub locked: bool,
    /// Hidden from the opponent during strategy
    pub assignment: Option<Vec<(OperationCategory, PlayerId)>>,
    pub slot: usize,
    pub answered_in_slot: u32,
    pub round_complete: bool,
    pub active_player: Option<PlayerId>,
    pub takeover: Option<Takeover>,
    pub quit_vote: Option<QuitVoteView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub phase: Phase,
    pub phase_deadline: Option<i64>,
    pub round: u32,
    pub viewer: PlayerId,
    pub players: Vec<PlayerView>,
    pub teams: Vec<TeamView>,
    /// The question the viewer is expected to answer, if any
    pub current_question: Option<QuestionView>,
    pub question_expires_at: Option<i64>,
    pub outcome: Option<MatchOutcome>,
    pub sequence: u64,
}

impl MatchSnapshot {
    pub fn build(state: &MatchState, viewer: PlayerId) -> Self {
        let viewer_side = state.players.get(&viewer).map(|p| p.side);

        let teams = Side::both()
            .iter()
            .map(|side| {
                let team = state.team(*side);
                let own = viewer_side == Some(*side);
                let assignment = if own || state.phase != Phase::Strategy {
                    Some(team.assignment.ordered(&state.turn_order).into_iter().filter_map(|c| {
                        team.assignment.holder(c).map(|p| (c, p))
                    }).collect())
                } else {
                    None
                };
                let quit_vote = team.quit_vote.as_ref().filter(|_| own).map(|v| QuitVoteView {
                    initiator: v.initiator,
                    yes: v.yes(),
                    no: v.no(),
                    outstanding: v.outstanding(),
                    deadline: v.deadline,
                });
                TeamView {
                    side: *side,
                    score: state.team_score(*side),
                    streak: team.streak,
                    locked: team.locked,
                    assignment,
                    slot: team.turn.slot,
                    answered_in_slot: team.turn.answered_in_slot,
                    round_complete: team.turn.round_complete,
                    active_player: if state.is_team() { state.active_player(*side) } else { None },
                    takeover: team.takeover,
                    quit_vote,
                }
            })
            .collect();

        let pending = match (state.is_team(), viewer_side) {
            (false, _) => state.players.get(&viewer).and_then(|p| p.pending.as_ref()),
            (true, Some(side)) if state.active_player(side) == Some(viewer) => state.team(side).pending.as_ref(),
            _ => None,
        };

        Self {
            match_id: state.match_id,
            mode: state.mode,
            match_type: state.match_type,
            phase: state.phase,
            phase_deadline: state.phase_deadline,
            round: state.round,
            viewer,
            players: state.players.values().map(PlayerView::from).collect(),
            teams,
            current_question: pending.map(|q| q.question.view()),
            question_expires_at: pending.map(|q| q.expires_at),
            outcome: state.outcome.clone(),
            sequence: state.sequence,
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.player_id == *id)
    }
}

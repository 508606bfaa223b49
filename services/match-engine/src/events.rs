//! Outbound match events
//!
//! Every event carries a per-match sequence number that only grows, also
//! across checkpoint restores, and the audience it is meant for.

use serde::{Deserialize, Serialize};
use types::ids::{MatchId, PlayerId};
use types::mode::Side;
use types::outcome::{BoxScore, MatchOutcome};
use types::question::{OperationCategory, QuestionView};

use crate::integrity::LinkState;
use crate::phase::Phase;
use crate::quit_vote::VoteResolution;
use crate::view::MatchSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Audience {
    All,
    Side(Side),
    Player(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    PhaseChanged {
        phase: Phase,
        round: u32,
        deadline: Option<i64>,
    },
    PlayerJoined {
        player_id: PlayerId,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    PlayerReconnected {
        player_id: PlayerId,
    },
    PlayerAbandoned {
        player_id: PlayerId,
    },
    QuestionIssued {
        player_id: PlayerId,
        question: QuestionView,
        expires_at: i64,
    },
    ScoreUpdate {
        player_id: PlayerId,
        side: Side,
        correct: bool,
        points: u32,
        player_score: u32,
        team_score: u32,
        streak: u32,
    },
    TurnChanged {
        side: Side,
        slot: usize,
        category: Option<OperationCategory>,
        player_id: Option<PlayerId>,
    },
    SlotsUpdated {
        side: Side,
        assignment: Vec<(OperationCategory, PlayerId)>,
    },
    SlotsLocked {
        side: Side,
    },
    TakeoverStarted {
        side: Side,
        category: OperationCategory,
        anchor: PlayerId,
    },
    TakeoverEnded {
        side: Side,
        category: OperationCategory,
    },
    QuitVoteOpened {
        side: Side,
        initiator: PlayerId,
        eligible: usize,
        deadline: i64,
    },
    QuitVoteUpdated {
        side: Side,
        yes: usize,
        no: usize,
        outstanding: usize,
    },
    QuitVoteResolved {
        side: Side,
        resolution: VoteResolution,
    },
    IntegrityAlert {
        player_id: PlayerId,
        side: Side,
        level: LinkState,
    },
    Ping {
        nonce: u64,
    },
    Snapshot(MatchSnapshot),
    MatchEnded {
        outcome: MatchOutcome,
        box_score: BoxScore,
    },
    MatchVoided {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub sequence: u64,
    pub audience: Audience,
    pub payload: EventPayload,
}

/// What a transport delivers to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub match_id: MatchId,
    pub sequence: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Envelope {
    pub fn new(match_id: MatchId, event: &MatchEvent) -> Self {
        Self {
            match_id,
            sequence: event.sequence,
            payload: event.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_is_flat_and_tagged() {
        let event = MatchEvent {
            sequence: 7,
            audience: Audience::All,
            payload: EventPayload::PhaseChanged { phase: Phase::Active, round: 1, deadline: Some(180_000) },
        };
        let json = serde_json::to_value(Envelope::new(MatchId::new(), &event)).unwrap();
        assert_eq!(json["type"], "phase_changed");
        assert_eq!(json["phase"], "active");
        assert_eq!(json["sequence"], 7);
    }
}

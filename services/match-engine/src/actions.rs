//! Typed player actions and their outcomes

use serde::{Deserialize, Serialize};
use types::errors::ActionError;
use types::ids::PlayerId;
use types::question::{OperationCategory, QuestionView};

use crate::integrity::LinkState;
use crate::view::MatchSnapshot;

/// Everything that can be done to a match on behalf of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MatchAction {
    Join,
    Disconnect,
    Reconnect,
    AssignSlot {
        category: OperationCategory,
        player: PlayerId,
    },
    ConfirmSlots,
    CallIn {
        category: OperationCategory,
    },
    ReleaseCallIn,
    SubmitAnswer {
        submitted_value: i32,
        #[serde(default)]
        client_timestamp: Option<i64>,
        #[serde(default)]
        question_id: Option<u64>,
    },
    OpenQuitVote,
    CastBallot {
        yes: bool,
    },
    Forfeit,
    Pong {
        nonce: u64,
    },
    /// Raised by the integrity monitor, never by clients
    IntegrityAlert {
        level: LinkState,
    },
}

impl MatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            MatchAction::Join => "join",
            MatchAction::Disconnect => "disconnect",
            MatchAction::Reconnect => "reconnect",
            MatchAction::AssignSlot { .. } => "assign_slot",
            MatchAction::ConfirmSlots => "confirm_slots",
            MatchAction::CallIn { .. } => "call_in",
            MatchAction::ReleaseCallIn => "release_call_in",
            MatchAction::SubmitAnswer { .. } => "submit_answer",
            MatchAction::OpenQuitVote => "open_quit_vote",
            MatchAction::CastBallot { .. } => "cast_ballot",
            MatchAction::Forfeit => "forfeit",
            MatchAction::Pong { .. } => "pong",
            MatchAction::IntegrityAlert { .. } => "integrity_alert",
        }
    }
}

/// Reply to an answer submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub accepted: bool,
    pub points_awarded: u32,
    pub new_streak: u32,
    pub correct: bool,
    pub next_question: Option<QuestionView>,
    pub reason: Option<String>,
}

impl AnswerResult {
    pub fn rejected(err: &ActionError) -> Self {
        Self {
            accepted: false,
            points_awarded: 0,
            new_streak: 0,
            correct: false,
            next_question: None,
            reason: Some(err.reason_code().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Ack,
    Answer(AnswerResult),
    Resynced(Box<MatchSnapshot>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_answer_wire_shape() {
        let action: MatchAction =
            serde_json::from_str(r#"{"action":"submit_answer","submitted_value":42,"client_timestamp":1700000000000}"#)
                .unwrap();
        assert_eq!(
            action,
            MatchAction::SubmitAnswer { submitted_value: 42, client_timestamp: Some(1_700_000_000_000), question_id: None }
        );
    }

    #[test]
    fn test_rejected_answer_carries_reason() {
        let r = AnswerResult::rejected(&ActionError::NotYourTurn);
        assert!(!r.accepted);
        assert_eq!(r.reason.as_deref(), Some("not_your_turn"));
        assert!(r.next_question.is_none());
    }
}

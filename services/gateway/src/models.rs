//! HTTP bodies and WebSocket messages

use match_engine::{ActionOutcome, AnswerResult, Envelope, MatchAction, MatchSnapshot};
use matchmaking::{EntryState, MatchFound};
use rules::rank::{Division, Tier};
use serde::{Deserialize, Serialize};
use types::ids::{EntrantId, MatchId, PartyId, PlayerId};
use types::mode::{GameMode, MatchType, QueueKey};
use types::participant::PartyRole;

#[derive(Debug, Clone, Deserialize)]
pub struct PartyMemberRequest {
    pub player_id: PlayerId,
    #[serde(default)]
    pub roles: Vec<PartyRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartyRequest {
    pub party_id: PartyId,
    pub members: Vec<PartyMemberRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinQueueRequest {
    pub mode: GameMode,
    pub match_type: MatchType,
    /// Queue as a party; the caller must be one of the members
    #[serde(default)]
    pub party: Option<PartyRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinQueueResponse {
    pub entrant: EntrantId,
    pub key: QueueKey,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusResponse {
    pub entrant: EntrantId,
    pub state: EntryState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankResponse {
    pub rating: i32,
    pub tier: Tier,
    pub division: Division,
    pub label: String,
}

/// Sent by clients over the socket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Action {
        match_id: MatchId,
        #[serde(flatten)]
        action: MatchAction,
    },
    Snapshot {
        match_id: MatchId,
    },
    LeaveQueue,
}

/// A seat as shown on the match-found screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatView {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub is_bot: bool,
}

/// Sent to clients over the socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        player_id: PlayerId,
    },
    QueueUpdate {
        entrant: EntrantId,
        state: EntryState,
    },
    MatchFound {
        match_id: MatchId,
        mode: GameMode,
        match_type: MatchType,
        vs_bots: bool,
        teams: [Vec<SeatView>; 2],
    },
    MatchEvent {
        event: Envelope,
    },
    ActionResult {
        match_id: MatchId,
        action: String,
        outcome: ActionOutcome,
    },
    Snapshot {
        snapshot: Box<MatchSnapshot>,
    },
    Rejected {
        match_id: Option<MatchId>,
        action: Option<String>,
        reason: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn match_found(found: &MatchFound) -> Self {
        let teams = found.teams.clone().map(|team| {
            team.iter()
                .map(|m| SeatView {
                    player_id: m.id(),
                    display_name: m.participant.display_name().to_string(),
                    rating: m.participant.rating(),
                    is_bot: m.participant.is_bot(),
                })
                .collect()
        });
        ServerMessage::MatchFound {
            match_id: found.match_id,
            mode: found.key.mode,
            match_type: found.key.match_type,
            vs_bots: found.vs_bots,
            teams,
        }
    }

    /// Reply to a rejected action; answers keep the submit-answer shape
    pub fn rejected_action(match_id: MatchId, action: &MatchAction, err: &types::errors::ActionError) -> Self {
        match action {
            MatchAction::SubmitAnswer { .. } => ServerMessage::ActionResult {
                match_id,
                action: action.name().to_string(),
                outcome: ActionOutcome::Answer(AnswerResult::rejected(err)),
            },
            _ => ServerMessage::Rejected {
                match_id: Some(match_id),
                action: Some(action.name().to_string()),
                reason: err.reason_code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::errors::ActionError;

    #[test]
    fn test_client_action_is_flat() {
        let match_id = MatchId::new();
        let raw = format!(
            r#"{{"type":"action","match_id":"{}","action":"submit_answer","submitted_value":12}}"#,
            match_id
        );
        let msg: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Action {
                match_id,
                action: MatchAction::SubmitAnswer { submitted_value: 12, client_timestamp: None, question_id: None },
            }
        );
        let leave: ClientMessage = serde_json::from_str(r#"{"type":"leave_queue"}"#).unwrap();
        assert_eq!(leave, ClientMessage::LeaveQueue);
    }

    #[test]
    fn test_rejected_answer_shape() {
        let match_id = MatchId::new();
        let action = MatchAction::SubmitAnswer { submitted_value: 1, client_timestamp: None, question_id: None };
        let msg = ServerMessage::rejected_action(match_id, &action, &ActionError::NotYourTurn);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "action_result");
        assert_eq!(json["outcome"]["accepted"], false);
        assert_eq!(json["outcome"]["reason"], "not_your_turn");

        let msg = ServerMessage::rejected_action(match_id, &MatchAction::Forfeit, &ActionError::MatchEnded);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "rejected");
        assert_eq!(json["reason"], "match_ended");
    }
}

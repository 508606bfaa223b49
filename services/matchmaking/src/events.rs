//! Events emitted by the matchmaker

use serde::{Deserialize, Serialize};
use types::ids::EntrantId;
use types::mode::QueueKey;

use crate::offer::{MatchFound, OfferId};

/// Why an entry left the queue without a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Requested,
    Disconnected,
    PartyDisbanded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchmakingEvent {
    Queued {
        entrant: EntrantId,
        key: QueueKey,
        rating: i32,
    },
    Left {
        entrant: EntrantId,
        reason: LeaveReason,
    },
    OfferCreated {
        offer_id: OfferId,
        entrants: Vec<EntrantId>,
        deliver_at: i64,
    },
    /// An offer was dropped because `left` left; `requeued` went back in line
    OfferCancelled {
        offer_id: OfferId,
        left: EntrantId,
        requeued: Vec<EntrantId>,
    },
    MatchFound(MatchFound),
    Expired {
        entrant: EntrantId,
        key: QueueKey,
    },
}

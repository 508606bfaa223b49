//! Settlement errors

use thiserror::Error;
use types::ids::{MatchId, PlayerId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Match {0} was already settled")]
    AlreadySettled(MatchId),

    #[error("No profile for player {0}")]
    ProfileNotFound(PlayerId),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Notification failed: {0}")]
    Notify(String),
}

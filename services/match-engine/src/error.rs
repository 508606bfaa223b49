//! Engine infrastructure errors
//!
//! Player-facing rejections are [`types::errors::ActionError`]; these are the
//! faults of the plumbing around a match.

use thiserror::Error;
use types::ids::{MatchId, PlayerId};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Match actor for {0} is gone")]
    ActorGone(MatchId),

    #[error("Match {0} is already running")]
    AlreadyRunning(MatchId),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error for {player}: {reason}")]
    Transport { player: PlayerId, reason: String },
}

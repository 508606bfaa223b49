//! Match checkpoints
//!
//! A checkpoint is the JSON-serialised [`MatchState`] plus the engine time it
//! was taken at and the wall-clock time it was written, so a restarted
//! process can tell how long the match sat idle. A SHA-256 digest over the
//! serialised state guards against truncated or edited records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::MatchId;

use crate::config::MatchConfig;
use crate::error::EngineError;
use crate::machine::MatchMachine;
use crate::state::MatchState;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub match_id: MatchId,
    pub saved_at: DateTime<Utc>,
    /// Match engine time when the checkpoint was taken
    pub engine_ms: i64,
    pub config: MatchConfig,
    pub state: MatchState,
    pub digest: String,
}

fn digest_of(state: &MatchState) -> Result<String, EngineError> {
    let bytes = serde_json::to_vec(state)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

impl Checkpoint {
    pub fn capture(machine: &MatchMachine, engine_ms: i64, saved_at: DateTime<Utc>) -> Result<Self, EngineError> {
        let state = machine.state().clone();
        let digest = digest_of(&state)?;
        Ok(Self {
            version: CHECKPOINT_VERSION,
            match_id: state.match_id,
            saved_at,
            engine_ms,
            config: machine.config().clone(),
            state,
            digest,
        })
    }

    pub fn verify(&self) -> Result<(), EngineError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(EngineError::Checkpoint(format!("unsupported version {}", self.version)));
        }
        if self.state.match_id != self.match_id {
            return Err(EngineError::Checkpoint("match id mismatch".to_string()));
        }
        let actual = digest_of(&self.state)?;
        if actual != self.digest {
            return Err(EngineError::Checkpoint(format!(
                "digest mismatch: expected {}, got {}",
                self.digest, actual
            )));
        }
        Ok(())
    }

    /// Milliseconds between the write and `now`
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.saved_at).num_milliseconds().max(0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let checkpoint: Checkpoint = serde_json::from_slice(bytes)?;
        checkpoint.verify()?;
        Ok(checkpoint)
    }

    pub fn into_machine(self) -> MatchMachine {
        MatchMachine::restore(self.state, self.config)
    }
}

//! Outbound ports of the match engine
//!
//! Delivery to players and durable checkpoints sit behind narrow async
//! traits. The in-memory implementations back the tests and the demo
//! gateway's checkpoint store.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use types::ids::{MatchId, PlayerId};

use crate::checkpoint::Checkpoint;
use crate::error::EngineError;
use crate::events::Envelope;

/// Per-recipient delivery of match events
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, player: PlayerId, envelope: &Envelope) -> Result<(), EngineError>;
}

/// Durable storage of match checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError>;
    async fn load_all(&self) -> Result<Vec<Checkpoint>, EngineError>;
    async fn remove(&self, match_id: MatchId) -> Result<(), EngineError>;
}

// ── In-memory implementations ───────────────────────────────────────────

/// Records everything sent; chosen players can be made unreachable
#[derive(Default)]
pub struct RecordingTransport {
    sent: DashMap<PlayerId, Vec<Envelope>>,
    unreachable: DashSet<PlayerId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, player: PlayerId, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(player);
        } else {
            self.unreachable.remove(&player);
        }
    }

    pub fn sent_to(&self, player: &PlayerId) -> Vec<Envelope> {
        self.sent.get(player).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        self.sent.clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, player: PlayerId, envelope: &Envelope) -> Result<(), EngineError> {
        if self.unreachable.contains(&player) {
            return Err(EngineError::Transport {
                player,
                reason: "unreachable".to_string(),
            });
        }
        self.sent.entry(player).or_default().push(envelope.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: DashMap<MatchId, Checkpoint>,
    failing_saves: AtomicU32,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    pub fn get(&self, match_id: &MatchId) -> Option<Checkpoint> {
        self.checkpoints.get(match_id).map(|c| c.clone())
    }

    pub fn insert(&self, checkpoint: Checkpoint) {
        self.checkpoints.insert(checkpoint.match_id, checkpoint);
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let failing = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Checkpoint("store unavailable".to_string()));
        }
        self.checkpoints.insert(checkpoint.match_id, checkpoint.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.checkpoints.iter().map(|c| c.value().clone()).collect())
    }

    async fn remove(&self, match_id: MatchId) -> Result<(), EngineError> {
        self.checkpoints.remove(&match_id);
        Ok(())
    }
}

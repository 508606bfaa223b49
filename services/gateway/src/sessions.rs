//! Open WebSocket sessions, one per player
//!
//! Each socket gets a bounded outbound queue drained by its writer task.
//! Match events are pushed without waiting: a full or closed queue is
//! reported back to the match actor as a delivery failure for that player
//! only.

use async_trait::async_trait;
use dashmap::DashMap;
use match_engine::{EngineError, Envelope, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};
use types::ids::PlayerId;

use crate::models::ServerMessage;

struct Session {
    id: u64,
    tx: mpsc::Sender<ServerMessage>,
}

pub struct SessionHub {
    sessions: DashMap<PlayerId, Session>,
    next_id: AtomicU64,
    buffer: usize,
}

impl SessionHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Open a session, replacing any older one for the same player
    pub fn register(&self, player: PlayerId) -> (u64, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.sessions.insert(player, Session { id, tx }).is_some() {
            info!(player_id = %player, "Replaced existing session");
        }
        (id, rx)
    }

    /// Close a session unless a newer one already took its place
    pub fn unregister(&self, player: &PlayerId, session_id: u64) -> bool {
        self.sessions.remove_if(player, |_, s| s.id == session_id).is_some()
    }

    pub fn is_online(&self, player: &PlayerId) -> bool {
        self.sessions.contains_key(player)
    }

    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn push(&self, player: PlayerId, message: ServerMessage) -> Result<(), EngineError> {
        let Some(session) = self.sessions.get(&player) else {
            return Err(EngineError::Transport {
                player,
                reason: "offline".to_string(),
            });
        };
        session.tx.try_send(message).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "outbound queue full",
                mpsc::error::TrySendError::Closed(_) => "socket closed",
            };
            debug!(player_id = %player, reason, "Dropped outbound message");
            EngineError::Transport {
                player,
                reason: reason.to_string(),
            }
        })
    }
}

#[async_trait]
impl Transport for SessionHub {
    async fn send(&self, player: PlayerId, envelope: &Envelope) -> Result<(), EngineError> {
        self.push(
            player,
            ServerMessage::MatchEvent {
                event: envelope.clone(),
            },
        )
    }
}

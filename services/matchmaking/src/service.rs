//! Queue actor
//!
//! One tokio task owns the [`Matchmaker`]. Commands arrive over a bounded
//! mpsc channel with oneshot replies; the task wakes for the scan interval
//! or the next offer delivery, whichever comes first. Every resulting
//! event is forwarded to the events channel.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{info, warn};
use types::errors::QueueError;
use types::ids::{EntrantId, PlayerId};
use types::mode::QueueKey;

use crate::config::QueueConfig;
use crate::engine::Matchmaker;
use crate::entry::{EntryState, JoinRequest, QueueEntry};
use crate::events::{LeaveReason, MatchmakingEvent};

const COMMAND_BUFFER: usize = 256;

enum Command {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<QueueEntry, QueueError>>,
    },
    Leave {
        entrant: EntrantId,
        reason: LeaveReason,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    LeavePlayer {
        player: PlayerId,
        reason: LeaveReason,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    State {
        entrant: EntrantId,
        reply: oneshot::Sender<EntryState>,
    },
    QueuedCount {
        key: QueueKey,
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the queue actor
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Command>,
}

impl QueueHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| QueueError::Unavailable)?;
        rx.await.map_err(|_| QueueError::Unavailable)
    }

    pub async fn join(&self, request: JoinRequest) -> Result<QueueEntry, QueueError> {
        self.request(|reply| Command::Join { request, reply }).await?
    }

    pub async fn leave(&self, entrant: EntrantId, reason: LeaveReason) -> Result<(), QueueError> {
        self.request(|reply| Command::Leave { entrant, reason, reply }).await?
    }

    /// Leave whatever entry the player belongs to
    pub async fn leave_player(&self, player: PlayerId, reason: LeaveReason) -> Result<(), QueueError> {
        self.request(|reply| Command::LeavePlayer { player, reason, reply }).await?
    }

    pub async fn state(&self, entrant: EntrantId) -> Result<EntryState, QueueError> {
        self.request(|reply| Command::State { entrant, reply }).await
    }

    pub async fn queued_count(&self, key: QueueKey) -> Result<usize, QueueError> {
        self.request(|reply| Command::QueuedCount { key, reply }).await
    }
}

/// The queue actor task
pub struct QueueService {
    engine: Matchmaker,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<MatchmakingEvent>,
    epoch: Instant,
}

impl QueueService {
    /// Spawn the actor; events are delivered on `events`
    pub fn spawn(config: QueueConfig, events: mpsc::Sender<MatchmakingEvent>) -> (QueueHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let service = Self {
            engine: Matchmaker::new(config),
            commands,
            events,
            epoch: Instant::now(),
        };
        let task = tokio::spawn(service.run());
        (QueueHandle { tx }, task)
    }

    fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn instant_at(&self, at_ms: i64) -> Instant {
        self.epoch + Duration::from_millis(at_ms.max(0) as u64)
    }

    async fn run(mut self) {
        info!("Queue service started");
        let scan_every = self.engine.config().scan_interval_ms.max(1);
        let mut next_scan = self.now_ms() + scan_every;

        loop {
            let wake_at = match self.engine.next_deadline() {
                Some(deadline) => deadline.min(next_scan),
                None => next_scan,
            };
            let wake = self.instant_at(wake_at);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = sleep_until(wake) => {
                    let now = self.now_ms();
                    let events = if now >= next_scan {
                        next_scan = now + scan_every;
                        self.engine.scan(now)
                    } else {
                        self.engine.deliver_due(now)
                    };
                    self.publish(events).await;
                }
            }
        }
        info!("Queue service stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Join { request, reply } => {
                let now = self.now_ms();
                let result = self.engine.join(request, now);
                if let Ok(entry) = &result {
                    let queued = MatchmakingEvent::Queued {
                        entrant: entry.entrant,
                        key: entry.key,
                        rating: entry.rating,
                    };
                    self.publish(vec![queued]).await;
                }
                let _ = reply.send(result);
            }
            Command::Leave { entrant, reason, reply } => {
                let result = self.engine.leave(&entrant, reason);
                let _ = reply.send(self.forward(result).await);
            }
            Command::LeavePlayer { player, reason, reply } => {
                let result = self.engine.leave_player(&player, reason);
                let _ = reply.send(self.forward(result).await);
            }
            Command::State { entrant, reply } => {
                let _ = reply.send(self.engine.state_of(&entrant));
            }
            Command::QueuedCount { key, reply } => {
                let _ = reply.send(self.engine.queued_count(&key));
            }
        }
    }

    async fn forward(&self, result: Result<Vec<MatchmakingEvent>, QueueError>) -> Result<(), QueueError> {
        let events = result?;
        self.publish(events).await;
        Ok(())
    }

    async fn publish(&self, events: Vec<MatchmakingEvent>) {
        for event in events {
            if self.events.send(event).await.is_err() {
                warn!("Matchmaking event receiver dropped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::mode::{GameMode, MatchType};
    use types::participant::{PartyMember, PlayerProfile};

    fn solo(key: QueueKey, rating: i32) -> JoinRequest {
        let m = PartyMember::human(PlayerProfile::new(PlayerId::new(), "p", rating));
        JoinRequest {
            entrant: EntrantId::Player(m.id()),
            key,
            members: vec![m],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_pairs_and_delivers() {
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let (handle, _task) = QueueService::spawn(QueueConfig::default(), events_tx);
        let key = QueueKey::new(GameMode::Duel, MatchType::Ranked);

        handle.join(solo(key, 1500)).await.unwrap();
        handle.join(solo(key, 1520)).await.unwrap();

        let mut found = None;
        while let Some(event) = events_rx.recv().await {
            if let MatchmakingEvent::MatchFound(m) = event {
                found = Some(m);
                break;
            }
        }
        let found = found.unwrap();
        assert_eq!(found.entrants.len(), 2);
        assert_eq!(handle.queued_count(key).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_leave_unknown() {
        let (events_tx, _events_rx) = mpsc::channel(64);
        let (handle, _task) = QueueService::spawn(QueueConfig::default(), events_tx);
        let err = handle
            .leave(EntrantId::Player(PlayerId::new()), LeaveReason::Requested)
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::NotQueued);
    }
}

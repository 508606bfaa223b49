//! Per-match actor
//!
//! One tokio task owns each [`MatchMachine`]. Commands arrive on a bounded
//! mpsc channel with optional oneshot replies. The only timer is a single
//! `sleep_until` on the earliest machine or integrity deadline, recomputed
//! after every step. Events are fanned out after the state change is
//! committed; checkpoints are written in the background on every phase
//! change. When the match reaches a terminal phase the box score goes to the
//! outcomes channel, the checkpoint is dropped and the task exits.

use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tracing::{debug, error, info, warn};
use types::errors::ActionError;
use types::ids::{MatchId, PlayerId};
use types::outcome::BoxScore;

use crate::actions::{ActionOutcome, MatchAction};
use crate::checkpoint::Checkpoint;
use crate::clock::EngineClock;
use crate::config::IntegrityConfig;
use crate::effects::{retry_with_backoff, RetryPolicy};
use crate::events::{Envelope, MatchEvent};
use crate::integrity::IntegrityMonitor;
use crate::machine::MatchMachine;
use crate::phase::Phase;
use crate::ports::{CheckpointStore, Transport};
use crate::view::MatchSnapshot;

/// Idle wake-up when nothing is scheduled
const IDLE_WAKE_MS: i64 = 60_000;

pub enum MatchCommand {
    Action {
        player: PlayerId,
        action: MatchAction,
        reply: Option<oneshot::Sender<Result<ActionOutcome, ActionError>>>,
    },
    Snapshot {
        player: PlayerId,
        reply: oneshot::Sender<Result<MatchSnapshot, ActionError>>,
    },
    Shutdown,
}

/// Shared collaborators of every match actor
#[derive(Clone)]
pub struct ActorContext {
    pub transport: Arc<dyn Transport>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub outcomes: mpsc::Sender<BoxScore>,
    pub integrity: IntegrityConfig,
    pub retry: RetryPolicy,
    pub clock: EngineClock,
}

/// Cloneable handle to one match actor
#[derive(Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    tx: mpsc::Sender<MatchCommand>,
    last_sequence: Arc<AtomicU64>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Sequence number of the last event handed to the transport
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Apply an action and wait for the result
    pub async fn act(&self, player: PlayerId, action: MatchAction) -> Result<ActionOutcome, ActionError> {
        let (reply, rx) = oneshot::channel();
        let command = MatchCommand::Action {
            player,
            action,
            reply: Some(reply),
        };
        // A gone actor means the match reached a terminal phase or crashed
        self.tx.send(command).await.map_err(|_| ActionError::MatchEnded)?;
        rx.await.map_err(|_| ActionError::MatchEnded)?
    }

    /// Apply an action without waiting for the result
    pub async fn tell(&self, player: PlayerId, action: MatchAction) -> Result<(), ActionError> {
        let command = MatchCommand::Action {
            player,
            action,
            reply: None,
        };
        self.tx.send(command).await.map_err(|_| ActionError::MatchEnded)
    }

    pub async fn snapshot(&self, player: PlayerId) -> Result<MatchSnapshot, ActionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MatchCommand::Snapshot { player, reply })
            .await
            .map_err(|_| ActionError::MatchEnded)?;
        rx.await.map_err(|_| ActionError::MatchEnded)?
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(MatchCommand::Shutdown).await;
    }
}

pub struct MatchActor {
    machine: MatchMachine,
    monitor: IntegrityMonitor,
    commands: mpsc::Receiver<MatchCommand>,
    ctx: ActorContext,
    /// Added to the engine clock to get this match's time
    offset_ms: i64,
    last_phase: Phase,
    last_sequence: Arc<AtomicU64>,
    pending_checkpoint: Option<JoinHandle<()>>,
}

impl MatchActor {
    /// Spawn the actor task for `machine`
    pub fn spawn(
        machine: MatchMachine,
        ctx: ActorContext,
        offset_ms: i64,
        buffer: usize,
    ) -> (MatchHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(buffer.max(1));
        let now = ctx.clock.now_ms() + offset_ms;
        let humans: Vec<PlayerId> = machine
            .state()
            .players
            .values()
            .filter(|p| !p.is_bot())
            .map(|p| p.id())
            .collect();
        let monitor = IntegrityMonitor::new(ctx.integrity.clone(), humans, now);
        let last_sequence = Arc::new(AtomicU64::new(machine.state().sequence));
        let handle = MatchHandle {
            match_id: machine.match_id(),
            tx,
            last_sequence: last_sequence.clone(),
        };
        let actor = Self {
            last_phase: machine.phase(),
            machine,
            monitor,
            commands,
            ctx,
            offset_ms,
            last_sequence,
            pending_checkpoint: None,
        };
        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    fn now(&self) -> i64 {
        self.ctx.clock.now_ms() + self.offset_ms
    }

    async fn run(mut self) {
        let match_id = self.machine.match_id();
        info!(match_id = %match_id, phase = %self.machine.phase(), "Match actor started");
        // Events queued before the task started (creation, resume)
        self.after_step().await;

        while !self.machine.is_terminal() {
            let now = self.now();
            let wake_at = match self.machine.next_deadline() {
                Some(deadline) => deadline.min(self.monitor.next_wake()),
                None => self.monitor.next_wake().min(now + IDLE_WAKE_MS),
            };
            let wake = self.ctx.clock.instant_at(wake_at - self.offset_ms);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(MatchCommand::Shutdown) | None => {
                        info!(match_id = %match_id, "Match actor shut down before the match ended");
                        return;
                    }
                    Some(command) => self.handle(command),
                },
                _ = sleep_until(wake) => self.on_timer(),
            }
            self.after_step().await;
        }
        self.finish().await;
    }

    fn handle(&mut self, command: MatchCommand) {
        let now = self.now();
        match command {
            MatchCommand::Action { player, action, reply } => {
                if let MatchAction::Pong { nonce } = action {
                    self.monitor.record_pong(player, nonce, now);
                }
                let name = action.name();
                let result = self.machine.apply(player, action, now);
                if let Err(e) = &result {
                    debug!(match_id = %self.machine.match_id(), player_id = %player, action = name, reason = e.reason_code(), "Action rejected");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            MatchCommand::Snapshot { player, reply } => {
                let result = if self.machine.state().players.contains_key(&player) {
                    Ok(self.machine.snapshot_for(player))
                } else {
                    Err(ActionError::NotAMember)
                };
                let _ = reply.send(result);
            }
            MatchCommand::Shutdown => {}
        }
    }

    fn on_timer(&mut self) {
        let now = self.now();
        self.machine.tick(now);
        self.sync_links(now);
        for (player, nonce) in self.monitor.due_pings(now) {
            self.machine.emit_ping(player, nonce);
        }
        for signal in self.monitor.sweep(now) {
            let alert = MatchAction::IntegrityAlert { level: signal.level };
            if let Err(e) = self.machine.apply(signal.player, alert, now) {
                debug!(match_id = %self.machine.match_id(), player_id = %signal.player, error = %e, "Integrity alert not applied");
            }
        }
    }

    /// Mirror machine presence into the link monitor
    fn sync_links(&mut self, now: i64) {
        let changes: Vec<(PlayerId, bool)> = self
            .machine
            .state()
            .players
            .values()
            .filter(|p| !p.is_bot())
            .map(|p| (p.id(), p.connection.is_connected()))
            .filter(|(id, connected)| self.monitor.is_connected(id) != *connected)
            .collect();
        for (player, connected) in changes {
            self.monitor.set_connected(player, connected, now);
        }
    }

    async fn after_step(&mut self) {
        let now = self.now();
        self.sync_links(now);
        let events = self.machine.drain_events();
        self.deliver(events).await;

        let phase = self.machine.phase();
        if phase != self.last_phase {
            self.last_phase = phase;
            if !phase.is_terminal() {
                self.checkpoint(now);
            }
        }
    }

    async fn deliver(&self, events: Vec<MatchEvent>) {
        let match_id = self.machine.match_id();
        for event in events {
            let envelope = Envelope::new(match_id, &event);
            let recipients = self.machine.recipients(&event.audience);
            let sends = recipients.into_iter().map(|player| {
                let transport = self.ctx.transport.clone();
                let envelope = &envelope;
                async move { (player, transport.send(player, envelope).await) }
            });
            for (player, result) in join_all(sends).await {
                if let Err(e) = result {
                    warn!(match_id = %match_id, player_id = %player, sequence = event.sequence, error = %e, "Event delivery failed");
                }
            }
            self.last_sequence.store(event.sequence, Ordering::SeqCst);
        }
    }

    /// Write a checkpoint in the background, superseding any still in flight
    fn checkpoint(&mut self, now: i64) {
        let checkpoint = match Checkpoint::capture(&self.machine, now, Utc::now()) {
            Ok(c) => c,
            Err(e) => {
                error!(match_id = %self.machine.match_id(), error = %e, "Could not capture checkpoint");
                return;
            }
        };
        if let Some(previous) = self.pending_checkpoint.take() {
            previous.abort();
        }
        let store = self.ctx.checkpoints.clone();
        let policy = self.ctx.retry;
        self.pending_checkpoint = Some(tokio::spawn(async move {
            let checkpoint = &checkpoint;
            let _ = retry_with_backoff(policy, "checkpoint", || {
                let store = store.clone();
                async move { store.save(checkpoint).await }
            })
            .await;
        }));
    }

    async fn finish(&mut self) {
        let match_id = self.machine.match_id();
        if let Some(pending) = self.pending_checkpoint.take() {
            pending.abort();
        }
        let box_score = self.machine.box_score();
        info!(match_id = %match_id, phase = %self.machine.phase(), outcome = ?box_score.outcome, "Match finished");
        if self.ctx.outcomes.send(box_score).await.is_err() {
            warn!(match_id = %match_id, "Outcome receiver dropped");
        }

        let store = self.ctx.checkpoints.clone();
        let policy = self.ctx.retry;
        tokio::spawn(async move {
            let _ = retry_with_backoff(policy, "checkpoint removal", || {
                let store = store.clone();
                async move { store.remove(match_id).await }
            })
            .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::events::EventPayload;
    use crate::machine::tests::{human, perfect_bot, setup};
    use crate::ports::{MemoryCheckpointStore, RecordingTransport};
    use tokio::time::{advance, Duration};
    use types::mode::{GameMode, MatchType};

    struct Fixture {
        handle: MatchHandle,
        task: JoinHandle<()>,
        transport: Arc<RecordingTransport>,
        store: Arc<MemoryCheckpointStore>,
        outcomes: mpsc::Receiver<BoxScore>,
    }

    fn spawn_duel(a: types::participant::PartyMember, b: types::participant::PartyMember) -> (Fixture, MatchId) {
        let s = setup(GameMode::Duel, MatchType::Ranked, vec![a], vec![b]);
        let transport = Arc::new(RecordingTransport::new());
        let store = Arc::new(MemoryCheckpointStore::new());
        let (outcomes_tx, outcomes) = mpsc::channel(8);
        let clock = EngineClock::start();
        let ctx = ActorContext {
            transport: transport.clone(),
            checkpoints: store.clone(),
            outcomes: outcomes_tx,
            // Test players never answer pings
            integrity: IntegrityConfig {
                red_sustain_ms: 10_000_000,
                ..IntegrityConfig::default()
            },
            retry: RetryPolicy::default(),
            clock,
        };
        let machine = MatchMachine::new(s.clone(), MatchConfig::default(), clock.now_ms());
        let (handle, task) = MatchActor::spawn(machine, ctx, 0, 16);
        (
            Fixture {
                handle,
                task,
                transport,
                store,
                outcomes,
            },
            s.match_id,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_plays_bot_duel_to_the_end() {
        let me = human(1200);
        let player = me.id();
        let (mut f, match_id) = spawn_duel(me, perfect_bot(1200));

        f.handle.act(player, MatchAction::Join).await.unwrap();
        let snapshot = f.handle.snapshot(player).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Active);

        advance(Duration::from_secs(75)).await;
        let box_score = f.outcomes.recv().await.unwrap();
        assert_eq!(box_score.match_id, match_id);
        f.task.await.unwrap();

        assert!(f.handle.is_closed());
        assert_eq!(f.handle.act(player, MatchAction::Forfeit).await, Err(ActionError::MatchEnded));
        let received = f.transport.sent_to(&player);
        assert!(received.iter().any(|e| matches!(e.payload, EventPayload::MatchEnded { .. })));
        assert!(received.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_checkpoints_phase_changes() {
        let (a, b) = (human(1200), human(1200));
        let (pa, pb) = (a.id(), b.id());
        let (f, match_id) = spawn_duel(a, b);

        f.handle.act(pa, MatchAction::Join).await.unwrap();
        f.handle.act(pb, MatchAction::Join).await.unwrap();
        // The save runs on its own task
        let mut saved = None;
        for _ in 0..100 {
            saved = f.store.get(&match_id);
            if saved.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let cp = saved.unwrap();
        assert_eq!(cp.state.phase, Phase::Active);
        cp.verify().unwrap();
        f.handle.shutdown().await;
        f.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_player_does_not_block_others() {
        let (a, b) = (human(1200), human(1200));
        let (pa, pb) = (a.id(), b.id());
        let (f, _) = spawn_duel(a, b);
        f.transport.set_unreachable(pb, true);

        f.handle.act(pa, MatchAction::Join).await.unwrap();
        f.handle.act(pb, MatchAction::Join).await.unwrap();
        f.handle.act(pa, MatchAction::Forfeit).await.unwrap();
        f.task.await.unwrap();

        assert!(f.transport.sent_to(&pb).is_empty());
        assert!(f
            .transport
            .sent_to(&pa)
            .iter()
            .any(|e| matches!(e.payload, EventPayload::MatchEnded { .. })));
        assert!(f.handle.last_sequence() > 0);
    }
}

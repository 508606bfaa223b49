//! Match supervisor
//!
//! Starts match actors, registers them, and watches each actor's task. A
//! panicking actor takes down only its own match: the supervisor voids it,
//! tells its players and reports the voided result. On startup, recent
//! checkpoints are resumed and stale ones are voided.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info, warn};
use types::ids::{MatchId, PlayerId};

use crate::actor::{ActorContext, MatchActor, MatchHandle};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{Envelope, EventPayload};
use crate::machine::MatchMachine;
use crate::registry::MatchRegistry;
use crate::state::MatchSetup;

/// What happened to the checkpoints found at startup
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResumeReport {
    pub resumed: Vec<MatchId>,
    pub voided: Vec<MatchId>,
    pub discarded: usize,
}

#[derive(Clone)]
pub struct MatchSupervisor {
    config: EngineConfig,
    ctx: ActorContext,
    registry: Arc<MatchRegistry>,
}

impl MatchSupervisor {
    pub fn new(config: EngineConfig, ctx: ActorContext) -> Self {
        let retention = Duration::from_millis(config.ended_retention_ms.max(0) as u64);
        Self {
            config,
            ctx,
            registry: Arc::new(MatchRegistry::with_retention(retention)),
        }
    }

    pub fn registry(&self) -> Arc<MatchRegistry> {
        self.registry.clone()
    }

    pub fn now_ms(&self) -> i64 {
        self.ctx.clock.now_ms()
    }

    /// Create and run a new match
    pub fn start(&self, setup: MatchSetup) -> Result<MatchHandle, EngineError> {
        if self.registry.handle(&setup.match_id).is_ok() || self.registry.is_ended(&setup.match_id) {
            return Err(EngineError::AlreadyRunning(setup.match_id));
        }
        let machine = MatchMachine::new(setup.clone(), self.config.matches.clone(), self.now_ms());
        info!(match_id = %setup.match_id, mode = %setup.mode, "Starting match");
        self.launch(machine, setup, 0)
    }

    fn launch(&self, machine: MatchMachine, setup: MatchSetup, offset_ms: i64) -> Result<MatchHandle, EngineError> {
        let players = setup.player_ids();
        let (handle, task) = MatchActor::spawn(machine, self.ctx.clone(), offset_ms, self.config.command_buffer);
        if let Err(e) = self.registry.insert(handle.clone(), &players) {
            // Never leave an unregistered actor running
            task.abort();
            return Err(e);
        }
        self.watch(handle.clone(), setup, task);
        Ok(handle)
    }

    fn watch(&self, handle: MatchHandle, setup: MatchSetup, task: JoinHandle<()>) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let match_id = handle.match_id();
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    error!(match_id = %match_id, "Match actor panicked, voiding match");
                    supervisor.void_crashed(&handle, setup).await;
                }
                Err(_) => warn!(match_id = %match_id, "Match actor cancelled"),
            }
            supervisor.registry.mark_ended(match_id);
        });
    }

    /// Void a match whose actor died, from its setup alone
    async fn void_crashed(&self, handle: &MatchHandle, setup: MatchSetup) {
        let match_id = setup.match_id;
        let now = self.now_ms();
        let mut machine = MatchMachine::new(setup.clone(), self.config.matches.clone(), now);
        machine.void("internal error", now);

        let humans: Vec<PlayerId> = setup
            .participants()
            .filter(|m| !m.participant.is_bot())
            .map(|m| m.id())
            .collect();
        self.notify_voided(match_id, &humans, handle.last_sequence() + 1, "internal error")
            .await;
        if self.ctx.outcomes.send(machine.box_score()).await.is_err() {
            warn!(match_id = %match_id, "Outcome receiver dropped");
        }
        self.remove_checkpoint(match_id).await;
    }

    async fn notify_voided(&self, match_id: MatchId, players: &[PlayerId], sequence: u64, reason: &str) {
        let envelope = Envelope {
            match_id,
            sequence,
            payload: EventPayload::MatchVoided {
                reason: reason.to_string(),
            },
        };
        for player in players {
            if let Err(e) = self.ctx.transport.send(*player, &envelope).await {
                warn!(match_id = %match_id, player_id = %player, error = %e, "Void notice not delivered");
            }
        }
    }

    async fn remove_checkpoint(&self, match_id: MatchId) {
        if let Err(e) = self.ctx.checkpoints.remove(match_id).await {
            warn!(match_id = %match_id, error = %e, "Could not remove checkpoint");
        }
    }

    /// Resume matches from stored checkpoints
    ///
    /// A checkpoint younger than the resume window continues where it left
    /// off with every human marked disconnected; an older one is voided and
    /// its players are told.
    pub async fn resume_from_checkpoints(&self) -> Result<ResumeReport, EngineError> {
        let mut report = ResumeReport::default();
        let wall_now = Utc::now();

        for checkpoint in self.ctx.checkpoints.load_all().await? {
            let match_id = checkpoint.match_id;
            if let Err(e) = checkpoint.verify() {
                error!(match_id = %match_id, error = %e, "Discarding unreadable checkpoint");
                self.remove_checkpoint(match_id).await;
                report.discarded += 1;
                continue;
            }
            if self.registry.handle(&match_id).is_ok() {
                continue;
            }

            let age_ms = checkpoint.age_ms(wall_now);
            let match_now = checkpoint.engine_ms + age_ms;
            let setup = MatchSetup::from_state(&checkpoint.state);
            let mut machine = checkpoint.into_machine();
            if machine.is_terminal() {
                self.remove_checkpoint(match_id).await;
                report.discarded += 1;
                continue;
            }

            if age_ms > self.config.resume_window_ms {
                warn!(match_id = %match_id, age_ms, "Checkpoint too old to resume, voiding");
                machine.void("server restart", match_now);
                let humans: Vec<PlayerId> = machine
                    .state()
                    .players
                    .values()
                    .filter(|p| !p.is_bot())
                    .map(|p| p.id())
                    .collect();
                let sequence = machine.state().sequence;
                self.notify_voided(match_id, &humans, sequence, "server restart").await;
                if self.ctx.outcomes.send(machine.box_score()).await.is_err() {
                    warn!(match_id = %match_id, "Outcome receiver dropped");
                }
                self.remove_checkpoint(match_id).await;
                report.voided.push(match_id);
                continue;
            }

            machine.on_resume(match_now);
            let offset_ms = match_now - self.now_ms();
            self.launch(machine, setup, offset_ms)?;
            info!(match_id = %match_id, age_ms, "Match resumed");
            report.resumed.push(match_id);
        }
        Ok(report)
    }
}

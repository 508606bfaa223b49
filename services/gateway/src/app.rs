//! Service wiring
//!
//! Starts the queue actor, the match supervisor and settlement, and pumps
//! matchmaking events into matches and player sockets. Stores behind the
//! ports are the in-memory implementations.

use crate::config::GatewayConfig;
use crate::models::ServerMessage;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionHub;
use crate::state::AppState;
use async_trait::async_trait;
use dashmap::DashMap;
use match_engine::{ActorContext, EngineClock, MatchAction, MatchSetup, MatchSupervisor, MemoryCheckpointStore};
use matchmaking::{EntryState, MatchFound, MatchmakingEvent, QueueService};
use settlement::{
    MemoryHistoryStore, MemoryProfiles, MemoryRatingStore, NotificationIntent, Notifier, SettlementError,
    SettlementPorts, SettlementService,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use types::ids::EntrantId;

const EVENT_BUFFER: usize = 1024;
const OUTCOME_BUFFER: usize = 256;

/// Hands notification intents to the log; delivery is another service's job
struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), SettlementError> {
        info!(
            player_id = %intent.user_id,
            template = %intent.template_key,
            params = ?intent.params,
            "Notification intent"
        );
        Ok(())
    }
}

pub struct Arena {
    pub state: AppState,
    pub tasks: Vec<JoinHandle<()>>,
}

pub async fn start(config: GatewayConfig) -> anyhow::Result<Arena> {
    let config = Arc::new(config);
    let sessions = Arc::new(SessionHub::new(config.session_buffer));
    let profiles = Arc::new(MemoryProfiles::new());

    let settlement = Arc::new(SettlementService::new(
        config.settlement.clone(),
        SettlementPorts {
            profiles: profiles.clone(),
            ratings: Arc::new(MemoryRatingStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            notifier: Arc::new(LogNotifier),
        },
    ));

    let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_BUFFER);
    let ctx = ActorContext {
        transport: sessions.clone(),
        checkpoints: Arc::new(MemoryCheckpointStore::new()),
        outcomes: outcomes_tx,
        integrity: config.engine.integrity.clone(),
        retry: config.engine.retry,
        clock: EngineClock::start(),
    };
    let supervisor = MatchSupervisor::new(config.engine.clone(), ctx);
    let report = supervisor.resume_from_checkpoints().await?;
    info!(
        resumed = report.resumed.len(),
        voided = report.voided.len(),
        discarded = report.discarded,
        "Checkpoints recovered"
    );

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (queue, queue_task) = QueueService::spawn(config.queue.clone(), events_tx);

    let state = AppState {
        config,
        rate_limiter: Arc::new(RateLimiter::new()),
        sessions,
        queue,
        registry: supervisor.registry(),
        supervisor,
        profiles,
        entrants: Arc::new(DashMap::new()),
    };

    let tasks = vec![
        queue_task,
        settlement.clone().spawn_decay_sweeper(),
        tokio::spawn(settlement.run(outcomes_rx)),
        tokio::spawn(pump_matchmaking(state.clone(), events_rx)),
    ];
    Ok(Arena { state, tasks })
}

async fn pump_matchmaking(state: AppState, mut events: mpsc::Receiver<MatchmakingEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            MatchmakingEvent::Queued { entrant, .. } => notify_entrant(&state, &entrant, EntryState::Queued),
            MatchmakingEvent::OfferCreated { entrants, .. } => {
                for entrant in &entrants {
                    notify_entrant(&state, entrant, EntryState::Offered);
                }
            }
            MatchmakingEvent::OfferCancelled { left, requeued, .. } => {
                notify_entrant(&state, &left, EntryState::Cancelled);
                state.entrants.remove(&left);
                for entrant in &requeued {
                    notify_entrant(&state, entrant, EntryState::Queued);
                }
            }
            MatchmakingEvent::Left { entrant, .. } => {
                notify_entrant(&state, &entrant, EntryState::Cancelled);
                state.entrants.remove(&entrant);
            }
            MatchmakingEvent::Expired { entrant, .. } => {
                notify_entrant(&state, &entrant, EntryState::Expired);
                state.entrants.remove(&entrant);
            }
            MatchmakingEvent::MatchFound(found) => start_match(&state, found).await,
        }
    }
    info!("Matchmaking event stream closed");
}

fn notify_entrant(state: &AppState, entrant: &EntrantId, entry_state: EntryState) {
    let Some(players) = state.entrants.get(entrant).map(|p| p.clone()) else {
        return;
    };
    let message = ServerMessage::QueueUpdate {
        entrant: *entrant,
        state: entry_state,
    };
    for player in players {
        let _ = state.sessions.push(player, message.clone());
    }
}

/// Create the match, tell its players, and join those already online
async fn start_match(state: &AppState, found: MatchFound) {
    let setup = MatchSetup {
        match_id: found.match_id,
        mode: found.key.mode,
        match_type: found.key.match_type,
        teams: found.teams.clone(),
    };
    if let Err(e) = state.supervisor.start(setup) {
        error!(match_id = %found.match_id, error = %e, "Could not start match");
        return;
    }
    for entrant in &found.entrants {
        notify_entrant(state, entrant, EntryState::Matched);
        state.entrants.remove(entrant);
    }

    let message = ServerMessage::match_found(&found);
    for player in found.human_players() {
        // Offline players join when their socket comes back
        if !state.sessions.is_online(&player) || state.sessions.push(player, message.clone()).is_err() {
            continue;
        }
        if let Err(e) = state.registry.act(&found.match_id, player, MatchAction::Join).await {
            debug!(match_id = %found.match_id, player_id = %player, reason = e.reason_code(), "Auto-join skipped");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use match_engine::{IntegrityConfig, Phase};
    use matchmaking::JoinRequest;
    use tokio::time::{Duration, sleep};
    use types::ids::PlayerId;
    use types::mode::{GameMode, MatchType, QueueKey};
    use types::participant::{PartyMember, PlayerProfile};

    /// Quick bot fallback, and test sockets never answer pings
    pub(crate) fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.jwt_secret = "test-secret".to_string();
        config.queue.casual_bot_fallback_ms = Some(2_000);
        config.queue.bot_seed = Some(11);
        config.engine.integrity = IntegrityConfig {
            red_sustain_ms: 10_000_000,
            ..IntegrityConfig::default()
        };
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_fallback_starts_match_for_online_player() {
        let arena = start(test_config()).await.unwrap();
        let state = arena.state;
        let player = PlayerId::new();
        let (_, mut inbox) = state.sessions.register(player);

        let entrant = EntrantId::Player(player);
        state.entrants.insert(entrant, vec![player]);
        let member = PartyMember::human(PlayerProfile::new(player, "ada", 1400));
        state
            .queue
            .join(JoinRequest {
                entrant,
                key: QueueKey::new(GameMode::Duel, MatchType::Casual),
                members: vec![member],
            })
            .await
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        let match_id = state.registry.match_of(&player).expect("match started");
        assert!(state.entrants.get(&entrant).is_none());

        let mut saw_found = false;
        let mut saw_active = false;
        while let Ok(message) = inbox.try_recv() {
            match message {
                ServerMessage::MatchFound { match_id: found, vs_bots, .. } => {
                    assert_eq!(found, match_id);
                    assert!(vs_bots);
                    saw_found = true;
                }
                ServerMessage::MatchEvent { event } => {
                    if let match_engine::EventPayload::PhaseChanged { phase: Phase::Active, .. } = event.payload {
                        saw_active = true;
                    }
                }
                _ => {}
            }
        }
        assert!(saw_found);
        // Auto-joined, so play started
        assert!(saw_active);
    }
}

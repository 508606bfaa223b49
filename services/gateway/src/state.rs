use crate::config::GatewayConfig;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionHub;
use dashmap::DashMap;
use match_engine::{MatchRegistry, MatchSupervisor};
use matchmaking::QueueHandle;
use settlement::MemoryProfiles;
use std::sync::Arc;
use types::ids::{EntrantId, PlayerId};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionHub>,
    pub queue: QueueHandle,
    pub supervisor: MatchSupervisor,
    pub registry: Arc<MatchRegistry>,
    pub profiles: Arc<MemoryProfiles>,
    /// Players behind each queued entrant, for queue notifications
    pub entrants: Arc<DashMap<EntrantId, Vec<PlayerId>>>,
}

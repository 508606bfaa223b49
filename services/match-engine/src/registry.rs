//! Registry of live matches
//!
//! Concurrent maps from match id to actor handle and from player to the
//! match they are in. Matches that ended stay known for a retention window
//! so late lookups can tell "ended" apart from "never existed".

use dashmap::DashMap;
use tokio::time::{Duration, Instant};
use tracing::debug;
use types::errors::ActionError;
use types::ids::{MatchId, PlayerId};

use crate::actions::{ActionOutcome, MatchAction};
use crate::actor::MatchHandle;
use crate::error::EngineError;
use crate::view::MatchSnapshot;

/// How long an ended match id is remembered by default
pub const ENDED_RETENTION: Duration = Duration::from_secs(600);

pub struct MatchRegistry {
    matches: DashMap<MatchId, MatchHandle>,
    players: DashMap<PlayerId, MatchId>,
    /// Ended matches and when they ended
    ended: DashMap<MatchId, Instant>,
    ended_retention: Duration,
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::with_retention(ENDED_RETENTION)
    }
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(ended_retention: Duration) -> Self {
        Self {
            matches: DashMap::new(),
            players: DashMap::new(),
            ended: DashMap::new(),
            ended_retention,
        }
    }

    pub fn insert(&self, handle: MatchHandle, players: &[PlayerId]) -> Result<(), EngineError> {
        let match_id = handle.match_id();
        if self.matches.contains_key(&match_id) || self.is_ended(&match_id) {
            return Err(EngineError::AlreadyRunning(match_id));
        }
        self.matches.insert(match_id, handle);
        for player in players {
            self.players.insert(*player, match_id);
        }
        debug!(match_id = %match_id, players = players.len(), "Match registered");
        Ok(())
    }

    /// Resolve a match: unknown, then ended
    pub fn handle(&self, match_id: &MatchId) -> Result<MatchHandle, ActionError> {
        if let Some(handle) = self.matches.get(match_id) {
            return Ok(handle.clone());
        }
        if self.is_ended(match_id) {
            Err(ActionError::MatchEnded)
        } else {
            Err(ActionError::MatchNotFound)
        }
    }

    /// Route an action; membership and grace are checked by the match itself
    pub async fn act(&self, match_id: &MatchId, player: PlayerId, action: MatchAction) -> Result<ActionOutcome, ActionError> {
        let handle = self.handle(match_id)?;
        handle.act(player, action).await
    }

    pub async fn snapshot(&self, match_id: &MatchId, player: PlayerId) -> Result<MatchSnapshot, ActionError> {
        let handle = self.handle(match_id)?;
        handle.snapshot(player).await
    }

    pub fn match_of(&self, player: &PlayerId) -> Option<MatchId> {
        self.players.get(player).map(|m| *m)
    }

    pub fn mark_ended(&self, match_id: MatchId) {
        if self.matches.remove(&match_id).is_some() {
            debug!(match_id = %match_id, "Match deregistered");
        }
        self.players.retain(|_, m| *m != match_id);
        let now = Instant::now();
        self.ended.retain(|_, at| now.duration_since(*at) < self.ended_retention);
        self.ended.insert(match_id, now);
    }

    /// Ended within the retention window
    pub fn is_ended(&self, match_id: &MatchId) -> bool {
        self.ended
            .get(match_id)
            .is_some_and(|at| at.elapsed() < self.ended_retention)
    }

    /// Ended match ids still remembered
    pub fn ended_count(&self) -> usize {
        self.ended.len()
    }

    pub fn live_count(&self) -> usize {
        self.matches.len()
    }

    pub fn live_matches(&self) -> Vec<MatchId> {
        self.matches.iter().map(|e| *e.key()).collect()
    }
}

//! Unique identifier types for arena entities
//!
//! All IDs use UUID v7 for time-sortable ordering, so match history and
//! queue audit logs sort chronologically by identifier alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a player (human or synthetic)
///
/// Owned by the identity subsystem for humans; bots receive a fresh id
/// when the matchmaker synthesizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Create a new PlayerId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a party queueing together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(Uuid);

impl PartyId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a live or archived match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Stable 64-bit seed derived from the id, used for per-match RNGs
    pub fn seed(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo.rotate_left(17)
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whoever occupies a queue entry: a solo player or a party
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntrantId {
    Player(PlayerId),
    Party(PartyId),
}

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrantId::Player(id) => write!(f, "player:{}", id),
            EntrantId::Party(id) => write!(f, "party:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_creation() {
        let id1 = PlayerId::new();
        let id2 = PlayerId::new();
        assert_ne!(id1, id2, "PlayerIds should be unique");
    }

    #[test]
    fn test_player_id_serialization() {
        let id = PlayerId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: PlayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_match_id_seed_is_stable() {
        let id = MatchId::new();
        assert_eq!(id.seed(), id.seed());
        assert_eq!(MatchId::from_uuid(*id.as_uuid()).seed(), id.seed());
    }

    #[test]
    fn test_entrant_id_display() {
        let party = PartyId::new();
        let entrant = EntrantId::Party(party);
        assert_eq!(entrant.to_string(), format!("party:{}", party));
    }

    #[test]
    fn test_entrant_id_serialization() {
        let entrant = EntrantId::Player(PlayerId::new());
        let json = serde_json::to_string(&entrant).unwrap();
        assert!(json.contains("\"kind\":\"player\""));
        let back: EntrantId = serde_json::from_str(&json).unwrap();
        assert_eq!(entrant, back);
    }
}

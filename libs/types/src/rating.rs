//! Rating records
//!
//! Written only by post-match settlement and the decay sweep.

use crate::ids::{MatchId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating assigned to a player with no competitive history
pub const STARTING_RATING: i32 = 1200;

/// Durable rating state of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub player_id: PlayerId,
    pub rating: i32,
    pub peak_rating: i32,
    /// Decay applied during the current inactivity spell
    pub decay_accumulated: i32,
    pub last_activity_at: DateTime<Utc>,
    pub placement_matches_remaining: u8,
    /// Set when the player came back after the returning threshold
    pub returning_since: Option<DateTime<Utc>>,
    pub soft_reset_applied: bool,
    pub matches_played: u32,
    /// Last decay sweep that looked at this record during the current spell
    #[serde(default)]
    pub last_decay_sweep_at: Option<DateTime<Utc>>,
    /// Most recent match this record was settled for
    #[serde(default)]
    pub last_settlement: Option<LastSettlement>,
}

/// Marks a settled match so a retried settlement never applies it twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSettlement {
    pub match_id: MatchId,
    /// Rating before the match was applied
    pub old_rating: i32,
}

impl RatingRecord {
    /// Fresh record for a first-time competitive player
    pub fn new(player_id: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            player_id,
            rating: STARTING_RATING,
            peak_rating: STARTING_RATING,
            decay_accumulated: 0,
            last_activity_at: now,
            placement_matches_remaining: 0,
            returning_since: None,
            soft_reset_applied: false,
            matches_played: 0,
            last_decay_sweep_at: None,
            last_settlement: None,
        }
    }

    /// Whole days since the last ranked activity (never negative)
    pub fn days_inactive(&self, now: DateTime<Utc>) -> u32 {
        let days = (now - self.last_activity_at).num_days();
        days.max(0) as u32
    }

    /// Seed a record from the rating a profile snapshot reported
    pub fn with_rating(player_id: PlayerId, rating: i32, now: DateTime<Utc>) -> Self {
        Self {
            rating,
            peak_rating: rating,
            ..Self::new(player_id, now)
        }
    }

    pub fn in_placement(&self) -> bool {
        self.placement_matches_remaining > 0
    }

    /// Rating before `match_id` if this record already carries that match
    pub fn settled_from(&self, match_id: &MatchId) -> Option<i32> {
        self.last_settlement
            .filter(|last| last.match_id == *match_id)
            .map(|last| last.old_rating)
    }
}

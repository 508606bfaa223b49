//! Matchmaking configuration

use serde::{Deserialize, Serialize};
use types::mode::MatchType;

/// Queue tuning. All durations are milliseconds of engine time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How often the matching pass runs
    pub scan_interval_ms: i64,
    /// Search window on join
    pub initial_window: i32,
    /// Window growth per whole second queued
    pub widen_per_sec: i32,
    /// Window never grows past this
    pub max_window: i32,
    /// "Match found" countdown before an offer is delivered
    pub offer_delay_ms: i64,
    /// Bot fallback for casual queues, `None` disables
    pub casual_bot_fallback_ms: Option<i64>,
    /// Bot fallback for ranked queues, `None` disables
    pub ranked_bot_fallback_ms: Option<i64>,
    /// Entries without bot fallback expire after this
    pub queue_timeout_ms: i64,
    /// Spread of synthesized bot ratings around the target
    pub bot_rating_spread: i32,
    /// Seed for bot synthesis, entropy when `None`
    pub bot_seed: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1_000,
            initial_window: 100,
            widen_per_sec: 5,
            max_window: 600,
            offer_delay_ms: 3_000,
            casual_bot_fallback_ms: Some(30_000),
            ranked_bot_fallback_ms: Some(60_000),
            queue_timeout_ms: 180_000,
            bot_rating_spread: 50,
            bot_seed: None,
        }
    }
}

impl QueueConfig {
    pub fn bot_fallback_ms(&self, match_type: MatchType) -> Option<i64> {
        match match_type {
            MatchType::Casual => self.casual_bot_fallback_ms,
            MatchType::Ranked => self.ranked_bot_fallback_ms,
        }
    }

    /// Config without bot fallback, used where only human pairing matters
    pub fn humans_only() -> Self {
        Self {
            casual_bot_fallback_ms: None,
            ranked_bot_fallback_ms: None,
            ..Self::default()
        }
    }
}

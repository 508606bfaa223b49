//! Settlement configuration

use match_engine::RetryPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Backoff for history writes and notifications
    pub retry: RetryPolicy,
    /// How often the decay sweep runs
    pub decay_sweep_interval_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            decay_sweep_interval_secs: 3_600,
        }
    }
}

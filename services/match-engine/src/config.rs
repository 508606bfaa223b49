//! Match and integrity configuration
//!
//! Durations are milliseconds of engine time.

use serde::{Deserialize, Serialize};

use crate::effects::RetryPolicy;

/// Phase timings and relay shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub waiting_ms: i64,
    pub strategy_ms: i64,
    pub question_limit_ms: i64,
    /// Length of the active phase in duels
    pub duel_length_ms: i64,
    pub rounds: u32,
    pub questions_per_slot: u32,
    pub round_limit_ms: i64,
    pub break_ms: i64,
    pub halftime_ms: i64,
    /// Halftime replaces the break after this round
    pub halftime_after_round: u32,
    pub post_match_ms: i64,
    pub reconnect_grace_ms: i64,
    pub quit_vote_ms: i64,
    /// Integrity faults this early in the active phase void the match
    pub integrity_void_window_ms: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            waiting_ms: 20_000,
            strategy_ms: 30_000,
            question_limit_ms: 15_000,
            duel_length_ms: 60_000,
            rounds: 4,
            questions_per_slot: 5,
            round_limit_ms: 180_000,
            break_ms: 10_000,
            halftime_ms: 30_000,
            halftime_after_round: 2,
            post_match_ms: 10_000,
            reconnect_grace_ms: 60_000,
            quit_vote_ms: 30_000,
            integrity_void_window_ms: 30_000,
        }
    }
}

/// Connection Integrity Monitor thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityConfig {
    pub ping_interval_ms: i64,
    /// Unanswered pings older than this count as lost
    pub loss_timeout_ms: i64,
    /// Loss ratio is measured over this many recent pings
    pub loss_window: usize,
    /// EWMA gain for round-trip time
    pub rtt_alpha: f64,
    /// EWMA gain for jitter
    pub jitter_beta: f64,
    pub green_rtt_ms: f64,
    pub green_jitter_ms: f64,
    pub green_loss: f64,
    pub yellow_rtt_ms: f64,
    pub yellow_jitter_ms: f64,
    pub yellow_loss: f64,
    /// Red must persist longer than this before an alert
    pub red_sustain_ms: i64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 2_000,
            loss_timeout_ms: 5_000,
            loss_window: 20,
            rtt_alpha: 0.125,
            jitter_beta: 0.25,
            green_rtt_ms: 150.0,
            green_jitter_ms: 50.0,
            green_loss: 0.05,
            yellow_rtt_ms: 400.0,
            yellow_jitter_ms: 150.0,
            yellow_loss: 0.20,
            red_sustain_ms: 10_000,
        }
    }
}

/// Everything the supervisor needs to run matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub matches: MatchConfig,
    pub integrity: IntegrityConfig,
    pub retry: RetryPolicy,
    /// Checkpoints older than this are voided instead of resumed
    pub resume_window_ms: i64,
    pub command_buffer: usize,
    /// Ended match ids answer "ended" rather than "not found" this long
    #[serde(default = "default_ended_retention_ms")]
    pub ended_retention_ms: i64,
}

fn default_ended_retention_ms() -> i64 {
    600_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matches: MatchConfig::default(),
            integrity: IntegrityConfig::default(),
            retry: RetryPolicy::default(),
            resume_window_ms: 120_000,
            command_buffer: 256,
            ended_retention_ms: default_ended_retention_ms(),
        }
    }
}

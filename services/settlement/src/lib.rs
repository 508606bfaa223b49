//! Post-match settlement
//!
//! The only writer of ratings. Turns a concluded match's box score into
//! rating changes, match-history rows and notification intents, and runs
//! the periodic inactivity decay sweep.
//!
//! **Key Invariants:**
//! - Only ranked, non-voided matches with a human move ratings
//! - No rating is written below the floor
//! - A match settles at most once

pub mod config;
pub mod decay;
pub mod error;
pub mod ports;
pub mod ratings;
pub mod records;
pub mod service;

pub use config::SettlementConfig;
pub use error::SettlementError;
pub use ports::{
    HistoryStore, MemoryHistoryStore, MemoryProfiles, MemoryRatingStore, Notifier, ProfileService, RatingStore,
    RecordingNotifier,
};
pub use ratings::{plan_settlement, SettlementPlan};
pub use records::{HistoryResult, MatchHistoryRow, NotificationIntent, SettlementRecord};
pub use service::{SettlementPorts, SettlementService, SweepReport};

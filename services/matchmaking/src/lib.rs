//! Matchmaking Service
//!
//! Rating-sorted queues keyed by (mode, match type), a periodic matching
//! pass with widening search windows, "match found" offers, and bot
//! fallback for entrants nobody could be paired with.
//!
//! **Key Invariants:**
//! - An entrant (and each of its members) is in at most one queue or offer
//! - A cancelled offer is never delivered
//! - Entries never pair across queue keys or with themselves

pub mod book;
pub mod bots;
pub mod config;
pub mod engine;
pub mod entry;
pub mod events;
pub mod offer;
pub mod pairing;
pub mod service;

pub use config::QueueConfig;
pub use engine::Matchmaker;
pub use entry::{EntryState, JoinRequest, QueueEntry};
pub use events::{LeaveReason, MatchmakingEvent};
pub use offer::{MatchFound, MatchOffer, Opponent};
pub use service::{QueueHandle, QueueService};

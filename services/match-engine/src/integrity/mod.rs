//! Connection Integrity Monitor
//!
//! Mechanism only: link statistics, traffic-light classification and
//! sustained-red signals. What a red signal does to the match is decided by
//! the state machine.

pub mod link;
pub mod monitor;

pub use link::{classify, LinkState, LinkStats};
pub use monitor::{IntegrityMonitor, IntegritySignal};

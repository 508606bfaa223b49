//! Pairing logic
//!
//! Window widening and the per-queue matching pass.

pub mod scan;
pub mod window;

pub use scan::find_pairs;
pub use window::{compatible, search_window};

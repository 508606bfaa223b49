//! Queue storage
//!
//! Contains rating levels and the per-key rating queue.

pub mod level;
pub mod rating_queue;

pub use level::RatingLevel;
pub use rating_queue::RatingQueue;

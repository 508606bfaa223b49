//! Placement mode for returning players
//!
//! While placement matches remain, rating deltas are amplified. Players who
//! do not finish placement within the grace window take a one-time penalty.

use crate::decay::DECAY_FLOOR;

/// Placement matches granted on return.
pub const PLACEMENT_MATCHES: u8 = 3;

/// Delta multiplier while in placement, as a ratio (3/2).
pub const PLACEMENT_MULTIPLIER_NUM: i32 = 3;
pub const PLACEMENT_MULTIPLIER_DEN: i32 = 2;

/// Days after return within which placement must be completed.
pub const SOFT_RESET_GRACE_DAYS: u32 = 14;

/// Points removed by the soft reset.
pub const SOFT_RESET_PENALTY: i32 = 100;

/// Amplify a rating delta, rounding half away from zero
pub fn amplify(delta: i32) -> i32 {
    let scaled = delta * PLACEMENT_MULTIPLIER_NUM;
    let half = PLACEMENT_MULTIPLIER_DEN / 2;
    if scaled >= 0 {
        (scaled + half) / PLACEMENT_MULTIPLIER_DEN
    } else {
        (scaled - half) / PLACEMENT_MULTIPLIER_DEN
    }
}

/// Whether the soft-reset penalty should be applied now
pub fn soft_reset_due(placement_remaining: u8, days_since_return: u32, already_applied: bool) -> bool {
    placement_remaining > 0 && !already_applied && days_since_return > SOFT_RESET_GRACE_DAYS
}

/// Rating after the soft reset, never below the decay floor
pub fn soft_reset(rating: i32) -> i32 {
    if rating <= DECAY_FLOOR {
        rating
    } else {
        (rating - SOFT_RESET_PENALTY).max(DECAY_FLOOR)
    }
}

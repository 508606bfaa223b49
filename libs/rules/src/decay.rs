//! Inactivity decay
//!
//! Step functions over whole days of inactivity. The sweep is idempotent:
//! it computes how much decay *should* have accumulated by day N and applies
//! only the difference, so missed or repeated sweeps converge.

use serde::{Deserialize, Serialize};

/// First inactive day that shows a warning.
pub const WARNING_START_DAYS: u32 = 14;
/// First day decay is applied.
pub const DECAY_START_DAYS: u32 = 21;
/// First day of the steeper decay rate.
pub const SEVERE_START_DAYS: u32 = 35;
/// From this day on the player is treated as returning.
pub const RETURNING_DAYS: u32 = 60;

/// Points per day while decaying.
pub const DECAY_POINTS_PER_DAY: i32 = 5;
/// Points per day while severely decaying.
pub const SEVERE_POINTS_PER_DAY: i32 = 15;

/// Decay never pushes a rating below this.
pub const DECAY_FLOOR: i32 = 1100;
/// Upper bound on decay within one inactivity spell.
pub const MAX_DECAY_PER_SPELL: i32 = 300;

/// Inactivity phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayPhase {
    Active,
    Warning,
    Decaying,
    Severe,
    Returning,
}

impl DecayPhase {
    /// Template key for the notification sent when entering this phase
    pub fn notification_key(&self) -> Option<&'static str> {
        match self {
            DecayPhase::Active => None,
            DecayPhase::Warning => Some("decay.warning"),
            DecayPhase::Decaying => Some("decay.started"),
            DecayPhase::Severe => Some("decay.severe"),
            DecayPhase::Returning => Some("decay.returning"),
        }
    }
}

pub fn decay_phase(days_inactive: u32) -> DecayPhase {
    match days_inactive {
        d if d >= RETURNING_DAYS => DecayPhase::Returning,
        d if d >= SEVERE_START_DAYS => DecayPhase::Severe,
        d if d >= DECAY_START_DAYS => DecayPhase::Decaying,
        d if d >= WARNING_START_DAYS => DecayPhase::Warning,
        _ => DecayPhase::Active,
    }
}

/// Points lost on the given day of inactivity
pub fn daily_decay(days_inactive: u32) -> i32 {
    match decay_phase(days_inactive) {
        DecayPhase::Decaying => DECAY_POINTS_PER_DAY,
        DecayPhase::Severe => SEVERE_POINTS_PER_DAY,
        DecayPhase::Active | DecayPhase::Warning | DecayPhase::Returning => 0,
    }
}

/// Total decay due after `days_inactive` days, capped per spell
pub fn cumulative_decay(days_inactive: u32) -> i32 {
    let decaying_days = days_inactive
        .min(SEVERE_START_DAYS - 1)
        .saturating_sub(DECAY_START_DAYS - 1) as i32;
    let severe_days = days_inactive
        .min(RETURNING_DAYS - 1)
        .saturating_sub(SEVERE_START_DAYS - 1) as i32;
    (decaying_days * DECAY_POINTS_PER_DAY + severe_days * SEVERE_POINTS_PER_DAY)
        .min(MAX_DECAY_PER_SPELL)
}

/// Decay to apply now given what was already applied this spell.
///
/// Never negative and never takes the rating below [`DECAY_FLOOR`].
pub fn decay_due(rating: i32, already_applied: i32, days_inactive: u32) -> i32 {
    let outstanding = (cumulative_decay(days_inactive) - already_applied).max(0);
    let headroom = (rating - DECAY_FLOOR).max(0);
    outstanding.min(headroom)
}

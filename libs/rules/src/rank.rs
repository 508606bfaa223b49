//! Rank model: map a rating onto {tier, division}
//!
//! Five contiguous tiers of 300 points above a 1100 floor, the top tier
//! unbounded. Each tier splits into three 100-point divisions, III lowest.
//! Total over all `f64` input: anything below the floor (negative, NaN)
//! clamps to Bronze III.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowest rating with its own band; everything below clamps here.
pub const RANK_FLOOR: f64 = 1100.0;

/// Width of each bounded tier.
pub const TIER_WIDTH: f64 = 300.0;

/// Divisions per tier.
pub const DIVISIONS_PER_TIER: usize = 3;

/// Width of a division (also used inside the unbounded top tier).
pub const DIVISION_WIDTH: f64 = TIER_WIDTH / DIVISIONS_PER_TIER as f64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rank tier, ordered lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum, Tier::Diamond];

    /// Inclusive lower bound of the tier band (Bronze reports the floor)
    pub fn min_rating(&self) -> f64 {
        RANK_FLOOR + TIER_WIDTH * self.index() as f64
    }

    fn index(&self) -> usize {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 1,
            Tier::Gold => 2,
            Tier::Platinum => 3,
            Tier::Diamond => 4,
        }
    }
}

/// Division inside a tier, III lowest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Division {
    III,
    II,
    I,
}

impl Division {
    const ALL: [Division; DIVISIONS_PER_TIER] = [Division::III, Division::II, Division::I];
}

/// Displayed rank. Ordering is tier first, then division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank {
    pub tier: Tier,
    pub division: Division,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.tier, self.division)
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Rank for a rating. Pure, total and monotonic.
pub fn rank_of(rating: f64) -> Rank {
    let clamped = if rating.is_nan() { RANK_FLOOR } else { rating.max(RANK_FLOOR) };
    let offset = clamped - RANK_FLOOR;

    // `as usize` saturates, so +inf lands in the top tier
    let tier_idx = ((offset / TIER_WIDTH).floor() as usize).min(Tier::ALL.len() - 1);
    let tier = Tier::ALL[tier_idx];

    let within = clamped - tier.min_rating();
    let div_idx = ((within / DIVISION_WIDTH).floor() as usize).min(DIVISIONS_PER_TIER - 1);

    Rank {
        tier,
        division: Division::ALL[div_idx],
    }
}

/// Convenience for integer ratings
pub fn rank_of_rating(rating: i32) -> Rank {
    rank_of(rating as f64)
}

//! ELO rating math
//!
//! Team matches use the mean starting rating of each side as the team
//! rating. Placement amplification happens after rounding the raw delta.

use crate::placement;

/// No rating is ever written below this.
pub const RATING_FLOOR: i32 = 100;

/// Matches before a player counts as established
pub const PROVISIONAL_MATCHES: u32 = 10;

const K_PROVISIONAL: f64 = 40.0;
const K_ESTABLISHED: f64 = 32.0;

/// K-factor for a player with the given number of settled matches
pub fn k_factor(matches_played: u32) -> f64 {
    if matches_played < PROVISIONAL_MATCHES {
        K_PROVISIONAL
    } else {
        K_ESTABLISHED
    }
}

/// Expected score of `own` against `opponent`
pub fn expected_score(own: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - own) / 400.0))
}

/// Mean of the given ratings, 0.0 for an empty side
pub fn team_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64
}

/// Inputs for one player's rating change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaInput {
    pub own_team_rating: f64,
    pub opponent_team_rating: f64,
    /// 1.0 win, 0.5 draw, 0.0 loss
    pub actual: f64,
    pub matches_played: u32,
    pub in_placement: bool,
}

/// Rounded rating delta, amplified during placement
pub fn rating_delta(input: &DeltaInput) -> i32 {
    let expected = expected_score(input.own_team_rating, input.opponent_team_rating);
    let raw = (k_factor(input.matches_played) * (input.actual - expected)).round() as i32;
    if input.in_placement {
        placement::amplify(raw)
    } else {
        raw
    }
}

/// Apply a delta, clamping at [`RATING_FLOOR`]
pub fn apply_delta(rating: i32, delta: i32) -> i32 {
    rating.saturating_add(delta).max(RATING_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input(own: f64, opp: f64, actual: f64) -> DeltaInput {
        DeltaInput {
            own_team_rating: own,
            opponent_team_rating: opp,
            actual,
            matches_played: 50,
            in_placement: false,
        }
    }

    #[test]
    fn test_expected_score_equal_ratings() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_expected_score_400_gap() {
        let e = expected_score(1900.0, 1500.0);
        assert!((e - 10.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_match_delta() {
        assert_eq!(rating_delta(&input(1500.0, 1500.0, 1.0)), 16);
        assert_eq!(rating_delta(&input(1500.0, 1500.0, 0.0)), -16);
        assert_eq!(rating_delta(&input(1500.0, 1500.0, 0.5)), 0);
    }

    #[test]
    fn test_provisional_k() {
        let mut i = input(1500.0, 1500.0, 1.0);
        i.matches_played = 3;
        assert_eq!(rating_delta(&i), 20);
    }

    #[test]
    fn test_placement_amplifies() {
        let mut i = input(1500.0, 1500.0, 1.0);
        i.in_placement = true;
        assert_eq!(rating_delta(&i), 24);
    }

    #[test]
    fn test_floor_clamp() {
        assert_eq!(apply_delta(110, -30), RATING_FLOOR);
        assert_eq!(apply_delta(1500, 16), 1516);
    }

    #[test]
    fn test_team_rating_mean() {
        assert_eq!(team_rating(&[1200, 1400, 1600]), 1400.0);
        assert_eq!(team_rating(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_one_v_one_zero_sum(a in 100i32..3000, b in 100i32..3000, actual in prop_oneof![Just(0.0), Just(0.5), Just(1.0)]) {
            let da = rating_delta(&input(a as f64, b as f64, actual));
            let db = rating_delta(&input(b as f64, a as f64, 1.0 - actual));
            // Independent rounding may leave at most one point of drift
            prop_assert!((da + db).abs() <= 1);
        }

        #[test]
        fn prop_never_below_floor(r in 0i32..5000, d in -500i32..500) {
            prop_assert!(apply_delta(r, d) >= RATING_FLOOR);
        }
    }
}

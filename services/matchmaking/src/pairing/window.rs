//! Search window compatibility
//!
//! A window starts narrow and widens with time queued, so long waits trade
//! match quality for availability.

use crate::config::QueueConfig;

/// Window for an entry that has waited `waited_ms`
pub fn search_window(config: &QueueConfig, waited_ms: i64) -> i32 {
    let secs = (waited_ms.max(0) / 1_000).min(i32::MAX as i64) as i32;
    config
        .initial_window
        .saturating_add(config.widen_per_sec.saturating_mul(secs))
        .min(config.max_window)
}

/// Two entries may pair if their gap fits the wider of their windows
pub fn compatible(rating_a: i32, window_a: i32, rating_b: i32, window_b: i32) -> bool {
    (rating_a - rating_b).abs() <= window_a.max(window_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_growth() {
        let cfg = QueueConfig::default();
        assert_eq!(search_window(&cfg, 0), 100);
        assert_eq!(search_window(&cfg, 999), 100);
        assert_eq!(search_window(&cfg, 10_000), 150);
        assert_eq!(search_window(&cfg, 100_000), 600);
        assert_eq!(search_window(&cfg, -5), 100);
    }

    #[test]
    fn test_compatible_uses_wider_window() {
        assert!(compatible(1500, 100, 1650, 150));
        assert!(!compatible(1500, 100, 1651, 150));
        assert!(compatible(1500, 100, 1400, 0));
    }

    proptest! {
        #[test]
        fn prop_window_monotonic_and_capped(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let cfg = QueueConfig::default();
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(search_window(&cfg, lo) <= search_window(&cfg, hi));
            prop_assert!(search_window(&cfg, hi) <= cfg.max_window);
        }

        #[test]
        fn prop_compatible_symmetric(ra in 0i32..3000, rb in 0i32..3000, wa in 0i32..600, wb in 0i32..600) {
            prop_assert_eq!(compatible(ra, wa, rb, wb), compatible(rb, wb, ra, wa));
        }
    }
}

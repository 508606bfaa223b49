//! Matching pass over one rating queue
//!
//! Entries are visited oldest first. Each picks the closest-rated compatible
//! entry still unpaired in this pass; ties go to the earlier joiner.

use std::collections::HashSet;
use types::ids::EntrantId;

use super::window::{compatible, search_window};
use crate::book::RatingQueue;
use crate::config::QueueConfig;
use crate::entry::QueueEntry;

/// Pairs found in one pass, `(older, partner)`
pub fn find_pairs(queue: &RatingQueue, now: i64, config: &QueueConfig) -> Vec<(EntrantId, EntrantId)> {
    let mut paired: HashSet<EntrantId> = HashSet::new();
    let mut pairs = Vec::new();

    for entry in queue.oldest_first() {
        if paired.contains(&entry.entrant) {
            continue;
        }
        if let Some(partner) = best_partner(queue, entry, &paired, now, config) {
            paired.insert(entry.entrant);
            paired.insert(partner);
            pairs.push((entry.entrant, partner));
        }
    }
    pairs
}

fn best_partner(
    queue: &RatingQueue,
    entry: &QueueEntry,
    paired: &HashSet<EntrantId>,
    now: i64,
    config: &QueueConfig,
) -> Option<EntrantId> {
    let own_window = search_window(config, entry.waited_ms(now));
    // No candidate can have a wider window than the cap
    let reach = own_window.max(config.max_window);
    let lo = entry.rating.saturating_sub(reach);
    let hi = entry.rating.saturating_add(reach);

    queue
        .in_range(lo, hi)
        .filter(|c| c.entrant != entry.entrant && !paired.contains(&c.entrant))
        .filter(|c| {
            let their_window = search_window(config, c.waited_ms(now));
            compatible(entry.rating, own_window, c.rating, their_window)
        })
        .min_by_key(|c| ((c.rating - entry.rating).abs(), c.priority()))
        .map(|c| c.entrant)
}

//! Rating level with time-priority ordering
//!
//! All entries at one rating value, kept ordered by `(joined_at, seq)` so the
//! longest-waiting entrant is always first, including entrants re-queued
//! after a cancelled offer.

use std::collections::VecDeque;
use types::ids::EntrantId;

#[derive(Debug, Clone, Copy)]
struct LevelEntry {
    priority: (i64, u64),
    entrant: EntrantId,
}

/// Entrants at a single rating
#[derive(Debug, Clone, Default)]
pub struct RatingLevel {
    entries: VecDeque<LevelEntry>,
}

impl RatingLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping time priority
    pub fn insert(&mut self, entrant: EntrantId, priority: (i64, u64)) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, LevelEntry { priority, entrant });
    }

    pub fn remove(&mut self, entrant: &EntrantId) -> bool {
        match self.entries.iter().position(|e| &e.entrant == entrant) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn front(&self) -> Option<EntrantId> {
        self.entries.front().map(|e| e.entrant)
    }

    /// Entrants in priority order
    pub fn iter(&self) -> impl Iterator<Item = EntrantId> + '_ {
        self.entries.iter().map(|e| e.entrant)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::PlayerId;

    fn entrant() -> EntrantId {
        EntrantId::Player(PlayerId::new())
    }

    #[test]
    fn test_level_fifo() {
        let mut level = RatingLevel::new();
        let (a, b, c) = (entrant(), entrant(), entrant());
        level.insert(a, (0, 1));
        level.insert(b, (10, 2));
        level.insert(c, (20, 3));
        assert_eq!(level.iter().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(level.front(), Some(a));
    }

    #[test]
    fn test_requeue_keeps_original_priority() {
        let mut level = RatingLevel::new();
        let (a, b, late) = (entrant(), entrant(), entrant());
        level.insert(a, (100, 5));
        level.insert(b, (200, 6));
        // Re-queued entrant that originally joined first
        level.insert(late, (50, 1));
        assert_eq!(level.front(), Some(late));
    }

    #[test]
    fn test_level_remove() {
        let mut level = RatingLevel::new();
        let (a, b) = (entrant(), entrant());
        level.insert(a, (0, 1));
        level.insert(b, (0, 2));
        assert!(level.remove(&a));
        assert!(!level.remove(&a));
        assert_eq!(level.len(), 1);
        assert_eq!(level.front(), Some(b));
    }
}

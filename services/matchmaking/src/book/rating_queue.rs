//! Rating-sorted queue for one (mode, match type)
//!
//! `BTreeMap` keyed by rating gives deterministic iteration and cheap range
//! scans around a target rating.

use std::collections::{BTreeMap, HashMap};
use types::ids::EntrantId;
use types::mode::QueueKey;

use super::level::RatingLevel;
use crate::entry::QueueEntry;

/// All entries waiting for one queue key
#[derive(Debug, Clone)]
pub struct RatingQueue {
    key: QueueKey,
    levels: BTreeMap<i32, RatingLevel>,
    entries: HashMap<EntrantId, QueueEntry>,
}

impl RatingQueue {
    pub fn new(key: QueueKey) -> Self {
        Self {
            key,
            levels: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }

    pub fn key(&self) -> QueueKey {
        self.key
    }

    /// Insert an entry. Returns false if the entrant is already present.
    pub fn insert(&mut self, entry: QueueEntry) -> bool {
        if self.entries.contains_key(&entry.entrant) {
            return false;
        }
        self.levels
            .entry(entry.rating)
            .or_insert_with(RatingLevel::new)
            .insert(entry.entrant, entry.priority());
        self.entries.insert(entry.entrant, entry);
        true
    }

    pub fn remove(&mut self, entrant: &EntrantId) -> Option<QueueEntry> {
        let entry = self.entries.remove(entrant)?;
        if let Some(level) = self.levels.get_mut(&entry.rating) {
            level.remove(entrant);
            // Drop empty levels to keep range scans tight
            if level.is_empty() {
                self.levels.remove(&entry.rating);
            }
        }
        Some(entry)
    }

    pub fn get(&self, entrant: &EntrantId) -> Option<&QueueEntry> {
        self.entries.get(entrant)
    }

    pub fn contains(&self, entrant: &EntrantId) -> bool {
        self.entries.contains_key(entrant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered oldest first
    pub fn oldest_first(&self) -> Vec<&QueueEntry> {
        let mut all: Vec<&QueueEntry> = self.entries.values().collect();
        all.sort_by_key(|e| e.priority());
        all
    }

    /// Entries with rating in `[lo, hi]`, ascending rating then time priority
    pub fn in_range(&self, lo: i32, hi: i32) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.levels
            .range(lo..=hi)
            .flat_map(|(_, level)| level.iter())
            .filter_map(move |id| self.entries.get(&id))
    }

    /// Lowest and highest queued ratings
    pub fn rating_bounds(&self) -> Option<(i32, i32)> {
        let lo = *self.levels.keys().next()?;
        let hi = *self.levels.keys().next_back()?;
        Some((lo, hi))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

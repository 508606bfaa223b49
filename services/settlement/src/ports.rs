//! Outbound ports of settlement
//!
//! Profile snapshots, rating records, match history and notifications are
//! owned by other services. The in-memory implementations back the tests
//! and the demo gateway.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use types::ids::PlayerId;
use types::participant::PlayerProfile;
use types::rating::RatingRecord;

use crate::error::SettlementError;
use crate::records::{MatchHistoryRow, NotificationIntent};

/// Identity/profile service: read at queue time, told about rating changes
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn snapshot(&self, player: PlayerId) -> Result<PlayerProfile, SettlementError>;
    async fn publish_rating(&self, player: PlayerId, rating: i32) -> Result<(), SettlementError>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn load(&self, player: PlayerId) -> Result<Option<RatingRecord>, SettlementError>;
    async fn save(&self, record: &RatingRecord) -> Result<(), SettlementError>;
    /// Every stored record, for the decay sweep
    async fn load_all(&self) -> Result<Vec<RatingRecord>, SettlementError>;
}

/// Append-only match history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, row: &MatchHistoryRow) -> Result<(), SettlementError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), SettlementError>;
}

// ── In-memory implementations ───────────────────────────────────────────

/// Decrement a failure budget; true while failures remain
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Default)]
pub struct MemoryProfiles {
    profiles: DashMap<PlayerId, PlayerProfile>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: PlayerProfile) {
        self.profiles.insert(profile.player_id, profile);
    }
}

#[async_trait]
impl ProfileService for MemoryProfiles {
    async fn snapshot(&self, player: PlayerId) -> Result<PlayerProfile, SettlementError> {
        self.profiles
            .get(&player)
            .map(|p| p.clone())
            .ok_or(SettlementError::ProfileNotFound(player))
    }

    async fn publish_rating(&self, player: PlayerId, rating: i32) -> Result<(), SettlementError> {
        match self.profiles.get_mut(&player) {
            Some(mut profile) => {
                profile.rating = rating;
                Ok(())
            }
            None => Err(SettlementError::ProfileNotFound(player)),
        }
    }
}

#[derive(Default)]
pub struct MemoryRatingStore {
    records: DashMap<PlayerId, RatingRecord>,
    failing_saves: AtomicU32,
    unwritable: DashSet<PlayerId>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: RatingRecord) {
        self.records.insert(record.player_id, record);
    }

    pub fn get(&self, player: &PlayerId) -> Option<RatingRecord> {
        self.records.get(player).map(|r| r.clone())
    }

    /// Make the next `n` saves fail
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Refuse every save of one player's record until `set_writable`
    pub fn set_unwritable(&self, player: PlayerId) {
        self.unwritable.insert(player);
    }

    pub fn set_writable(&self, player: &PlayerId) {
        self.unwritable.remove(player);
    }
}

#[async_trait]
impl RatingStore for MemoryRatingStore {
    async fn load(&self, player: PlayerId) -> Result<Option<RatingRecord>, SettlementError> {
        Ok(self.get(&player))
    }

    async fn save(&self, record: &RatingRecord) -> Result<(), SettlementError> {
        if take_failure(&self.failing_saves) || self.unwritable.contains(&record.player_id) {
            return Err(SettlementError::Store("rating store unavailable".to_string()));
        }
        self.records.insert(record.player_id, record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<RatingRecord>, SettlementError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: Mutex<Vec<MatchHistoryRow>>,
    failing_appends: AtomicU32,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<MatchHistoryRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn rows_for(&self, player: &PlayerId) -> Vec<MatchHistoryRow> {
        self.rows().into_iter().filter(|r| r.player_id == *player).collect()
    }

    pub fn fail_next_appends(&self, n: u32) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, row: &MatchHistoryRow) -> Result<(), SettlementError> {
        if take_failure(&self.failing_appends) {
            return Err(SettlementError::Store("history store unavailable".to_string()));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| SettlementError::Store("history lock poisoned".to_string()))?;
        rows.push(row.clone());
        Ok(())
    }
}

/// Collects intents instead of delivering them
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationIntent>>,
    failing: AtomicU32,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationIntent> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn with_template(&self, template_key: &str) -> Vec<NotificationIntent> {
        self.sent().into_iter().filter(|n| n.template_key == template_key).collect()
    }

    pub fn fail_next(&self, n: u32) {
        self.failing.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), SettlementError> {
        if take_failure(&self.failing) {
            return Err(SettlementError::Notify("notifier unavailable".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| SettlementError::Notify("notifier lock poisoned".to_string()))?;
        sent.push(intent.clone());
        Ok(())
    }
}

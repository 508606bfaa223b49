//! Settlement service
//!
//! Consumes box scores from the match engine. Rating writes are awaited so
//! a failed settlement can be retried as a whole; history rows, profile
//! updates and notifications are dispatched afterwards on their own task
//! and retried with backoff without holding up the next match.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use match_engine::{retry_with_backoff, RetryPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use types::ids::{MatchId, PlayerId};
use types::outcome::BoxScore;

use crate::config::SettlementConfig;
use crate::decay::{self, phase_name};
use crate::error::SettlementError;
use crate::ports::{HistoryStore, Notifier, ProfileService, RatingStore};
use crate::ratings::{plan_settlement, SettlementPlan};
use crate::records::{MatchHistoryRow, NotificationIntent, SettlementRecord};

/// The services settlement writes to
#[derive(Clone)]
pub struct SettlementPorts {
    pub profiles: Arc<dyn ProfileService>,
    pub ratings: Arc<dyn RatingStore>,
    pub history: Arc<dyn HistoryStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Result of one decay sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub decayed: usize,
    pub notified: usize,
}

pub struct SettlementService {
    config: SettlementConfig,
    ports: SettlementPorts,
    settled: DashSet<MatchId>,
}

impl SettlementService {
    pub fn new(config: SettlementConfig, ports: SettlementPorts) -> Self {
        Self {
            config,
            ports,
            settled: DashSet::new(),
        }
    }

    pub fn is_settled(&self, match_id: &MatchId) -> bool {
        self.settled.contains(match_id)
    }

    /// Settle a concluded match; each match settles at most once
    pub async fn settle(&self, box_score: &BoxScore) -> Result<Vec<SettlementRecord>, SettlementError> {
        let match_id = box_score.match_id;
        if !self.settled.insert(match_id) {
            return Err(SettlementError::AlreadySettled(match_id));
        }
        match self.settle_at(box_score, Utc::now()).await {
            Ok(plan) => Ok(plan.records),
            Err(e) => {
                self.settled.remove(&match_id);
                Err(e)
            }
        }
    }

    async fn settle_at(&self, box_score: &BoxScore, now: DateTime<Utc>) -> Result<SettlementPlan, SettlementError> {
        let policy = self.config.retry;
        let mut current = BTreeMap::new();
        for line in box_score.humans() {
            let ratings = &self.ports.ratings;
            let player = line.player_id;
            if let Some(record) = retry_with_backoff(policy, "rating load", || ratings.load(player)).await? {
                current.insert(player, record);
            }
        }

        let plan = plan_settlement(box_score, &current, now);
        for update in &plan.updates {
            let ratings = &self.ports.ratings;
            retry_with_backoff(policy, "rating save", || ratings.save(update)).await?;
        }
        info!(
            match_id = %plan.match_id,
            rated = plan.rated,
            outcome = ?box_score.outcome,
            settled = plan.records.len(),
            "Match settled"
        );

        self.dispatch(plan.records.clone(), plan.history.clone(), plan.notifications.clone());
        Ok(plan)
    }

    /// Fire-and-forget the non-authoritative writes of a settlement
    fn dispatch(
        &self,
        records: Vec<SettlementRecord>,
        history: Vec<MatchHistoryRow>,
        notifications: Vec<NotificationIntent>,
    ) {
        let ports = self.ports.clone();
        let policy = self.config.retry;
        tokio::spawn(async move {
            for record in &records {
                publish_rating(&ports, policy, record.player_id, record.new_rating).await;
            }
            for row in &history {
                let store = &ports.history;
                if retry_with_backoff(policy, "history append", || store.append(row)).await.is_err() {
                    error!(match_id = %row.match_id, player_id = %row.player_id, "History row lost");
                }
            }
            for intent in &notifications {
                notify(&ports, policy, intent).await;
            }
        });
    }

    /// Settle every box score arriving on `outcomes` until the sender closes
    pub async fn run(self: Arc<Self>, mut outcomes: mpsc::Receiver<BoxScore>) {
        info!("Settlement service started");
        while let Some(box_score) = outcomes.recv().await {
            if let Err(e) = self.settle(&box_score).await {
                match e {
                    SettlementError::AlreadySettled(_) => debug!(match_id = %box_score.match_id, "Duplicate box score ignored"),
                    e => error!(match_id = %box_score.match_id, error = %e, "Settlement failed"),
                }
            }
        }
        info!("Settlement service stopped");
    }

    /// Apply inactivity decay to every stored record
    pub async fn sweep_decay(&self, now: DateTime<Utc>) -> Result<SweepReport, SettlementError> {
        let policy = self.config.retry;
        let ratings = &self.ports.ratings;
        let records = retry_with_backoff(policy, "rating load", || ratings.load_all()).await?;
        let mut report = SweepReport {
            examined: records.len(),
            ..SweepReport::default()
        };

        for record in &records {
            let Some(change) = decay::sweep_record(record, now) else {
                continue;
            };
            retry_with_backoff(policy, "rating save", || ratings.save(&change.record)).await?;
            if change.decayed > 0 || change.soft_reset > 0 {
                report.decayed += 1;
                publish_rating(&self.ports, policy, change.record.player_id, change.record.rating).await;
            }
            if change.phase_changed() {
                debug!(
                    player_id = %change.record.player_id,
                    from = phase_name(change.phase_before),
                    to = phase_name(change.phase_after),
                    "Decay phase changed"
                );
            }
            if let Some(intent) = change.notification(now) {
                report.notified += 1;
                let ports = self.ports.clone();
                tokio::spawn(async move { notify(&ports, policy, &intent).await });
            }
        }
        info!(
            examined = report.examined,
            decayed = report.decayed,
            notified = report.notified,
            "Decay sweep complete"
        );
        Ok(report)
    }

    /// Run the decay sweep on the configured interval
    pub fn spawn_decay_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let every = Duration::from_secs(self.config.decay_sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_decay(Utc::now()).await {
                    warn!(error = %e, "Decay sweep failed");
                }
            }
        })
    }
}

async fn publish_rating(ports: &SettlementPorts, policy: RetryPolicy, player: PlayerId, rating: i32) {
    let profiles = &ports.profiles;
    let _ = retry_with_backoff(policy, "profile rating", || profiles.publish_rating(player, rating)).await;
}

async fn notify(ports: &SettlementPorts, policy: RetryPolicy, intent: &NotificationIntent) {
    let notifier = &ports.notifier;
    if retry_with_backoff(policy, "notification", || notifier.notify(intent)).await.is_err() {
        warn!(player_id = %intent.user_id, template = %intent.template_key, "Notification dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MemoryHistoryStore, MemoryProfiles, MemoryRatingStore, RecordingNotifier};
    use crate::records::{TEMPLATE_DECAY_PHASE_CHANGED, TEMPLATE_SETTLEMENT_COMPLETED};
    use chrono::Duration as WallDuration;
    use types::mode::{GameMode, MatchType, Side};
    use types::outcome::{MatchOutcome, PlayerLine, TeamLine, WinReason};
    use types::participant::PlayerProfile;
    use types::rating::RatingRecord;

    struct Fixture {
        service: SettlementService,
        profiles: Arc<MemoryProfiles>,
        ratings: Arc<MemoryRatingStore>,
        history: Arc<MemoryHistoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let profiles = Arc::new(MemoryProfiles::new());
        let ratings = Arc::new(MemoryRatingStore::new());
        let history = Arc::new(MemoryHistoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ports = SettlementPorts {
            profiles: profiles.clone(),
            ratings: ratings.clone(),
            history: history.clone(),
            notifier: notifier.clone(),
        };
        Fixture {
            service: SettlementService::new(SettlementConfig::default(), ports),
            profiles,
            ratings,
            history,
            notifier,
        }
    }

    fn duel(winner: Side, a: PlayerId, b: PlayerId) -> BoxScore {
        let line = |player_id, side| PlayerLine {
            player_id,
            display_name: "p".to_string(),
            side,
            is_bot: false,
            rating_at_start: 1500,
            score: 300,
            correct: 3,
            answered: 4,
            best_streak: 3,
            total_latency_ms: 9_000,
        };
        let players = vec![line(a, Side::A), line(b, Side::B)];
        BoxScore {
            match_id: MatchId::new(),
            mode: GameMode::Duel,
            match_type: MatchType::Ranked,
            outcome: MatchOutcome::Winner { side: winner, reason: WinReason::Score },
            teams: Side::both().map(|side| TeamLine::from_players(side, &players)),
            players,
            duration_ms: 60_000,
        }
    }

    fn seed(f: &Fixture, player: PlayerId, rating: i32) {
        let mut record = RatingRecord::with_rating(player, rating, Utc::now() - WallDuration::days(1));
        record.matches_played = 25;
        f.ratings.insert(record);
        f.profiles.upsert(PlayerProfile::new(player, "p", rating));
    }

    async fn settle_effects() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_writes_ratings_then_effects() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        seed(&f, a, 1500);
        seed(&f, b, 1500);

        let records = f.service.settle(&duel(Side::A, a, b)).await.unwrap();
        assert_eq!(records.len(), 2);
        // Ratings are durable before settle returns
        assert_eq!(f.ratings.get(&a).unwrap().rating, 1516);
        assert_eq!(f.ratings.get(&b).unwrap().rating, 1484);

        settle_effects().await;
        assert_eq!(f.history.rows().len(), 2);
        assert_eq!(f.profiles.snapshot(a).await.unwrap().rating, 1516);
        assert_eq!(f.notifier.with_template(TEMPLATE_SETTLEMENT_COMPLETED).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_settles_once() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        let score = duel(Side::B, a, b);
        f.service.settle(&score).await.unwrap();
        assert_eq!(
            f.service.settle(&score).await,
            Err(SettlementError::AlreadySettled(score.match_id))
        );
        assert!(f.service.is_settled(&score.match_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rating_write_can_be_retried() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        seed(&f, a, 1500);
        seed(&f, b, 1500);
        let score = duel(Side::A, a, b);

        f.ratings.fail_next_saves(5);
        assert!(matches!(f.service.settle(&score).await, Err(SettlementError::Store(_))));
        assert!(!f.service.is_settled(&score.match_id));

        f.service.settle(&score).await.unwrap();
        assert_eq!(f.ratings.get(&a).unwrap().rating, 1516);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_partial_write_applies_each_delta_once() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        seed(&f, a, 1500);
        seed(&f, b, 1500);
        let score = duel(Side::A, a, b);

        f.ratings.set_unwritable(b);
        assert!(matches!(f.service.settle(&score).await, Err(SettlementError::Store(_))));
        assert_eq!(f.ratings.get(&a).unwrap().rating, 1516);
        assert_eq!(f.ratings.get(&b).unwrap().rating, 1500);

        f.ratings.set_writable(&b);
        let records = f.service.settle(&score).await.unwrap();
        assert_eq!(f.ratings.get(&a).unwrap().rating, 1516);
        assert_eq!(f.ratings.get(&a).unwrap().matches_played, 26);
        assert_eq!(f.ratings.get(&b).unwrap().rating, 1484);
        assert_eq!(records[0].delta, 16);
        assert_eq!(records[1].delta, -16);

        settle_effects().await;
        assert_eq!(f.history.rows().len(), 2);
        assert_eq!(f.notifier.with_template(TEMPLATE_SETTLEMENT_COMPLETED).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_history_store_is_retried() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        seed(&f, a, 1500);
        seed(&f, b, 1500);
        f.history.fail_next_appends(2);
        f.notifier.fail_next(1);
        f.service.settle(&duel(Side::A, a, b)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.history.rows().len(), 2);
        assert_eq!(f.notifier.with_template(TEMPLATE_SETTLEMENT_COMPLETED).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_consumes_outcomes() {
        let f = fixture();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        seed(&f, a, 1500);
        seed(&f, b, 1500);
        let service = Arc::new(f.service);
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(service.clone().run(rx));

        let score = duel(Side::A, a, b);
        tx.send(score.clone()).await.unwrap();
        tx.send(score.clone()).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert!(service.is_settled(&score.match_id));
        settle_effects().await;
        assert_eq!(f.history.rows_for(&a).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decay_sweep() {
        let f = fixture();
        let now = Utc::now();
        let idle = PlayerId::new();
        let fresh = PlayerId::new();
        let mut record = RatingRecord::with_rating(idle, 1800, now - WallDuration::days(25));
        record.matches_played = 40;
        f.ratings.insert(record);
        f.profiles.upsert(PlayerProfile::new(idle, "idle", 1800));
        f.ratings.insert(RatingRecord::with_rating(fresh, 1500, now));

        let report = f.service.sweep_decay(now).await.unwrap();
        assert_eq!(report, SweepReport { examined: 2, decayed: 1, notified: 1 });
        assert_eq!(f.ratings.get(&idle).unwrap().rating, 1775);
        assert_eq!(f.profiles.snapshot(idle).await.unwrap().rating, 1775);

        settle_effects().await;
        let intents = f.notifier.with_template(TEMPLATE_DECAY_PHASE_CHANGED);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].params["phase"], "decaying");

        // Same day again: nothing new
        let again = f.service.sweep_decay(now).await.unwrap();
        assert_eq!(again, SweepReport { examined: 2, decayed: 0, notified: 0 });
    }
}

//! Rating settlement of a concluded match
//!
//! Pure: given the box score and the current rating records of the human
//! participants, compute every rating write, history row and notification.
//! The service applies the plan.
//!
//! Only ranked, non-voided matches with at least one human move ratings.
//! Team rating is the mean start rating of a side, bots included, and every
//! player on a side is rated against the same pair of team ratings.

use chrono::{DateTime, Utc};
use rules::decay::RETURNING_DAYS;
use rules::elo::{self, DeltaInput};
use rules::placement::{self, PLACEMENT_MATCHES};
use rules::rank::rank_of_rating;
use std::collections::BTreeMap;
use tracing::debug;
use types::ids::{MatchId, PlayerId};
use types::mode::{MatchType, Side};
use types::outcome::{BoxScore, MatchOutcome, PlayerLine};
use types::rating::{LastSettlement, RatingRecord};

use crate::records::{
    HistoryHeader, HistoryResult, MatchHistoryRow, NotificationIntent, SettlementRecord,
    TEMPLATE_RANK_CHANGED, TEMPLATE_SETTLEMENT_COMPLETED,
};

/// Everything settlement will write for one match
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPlan {
    pub match_id: MatchId,
    pub rated: bool,
    pub records: Vec<SettlementRecord>,
    /// New rating records to persist (rated matches only)
    pub updates: Vec<RatingRecord>,
    pub history: Vec<MatchHistoryRow>,
    pub notifications: Vec<NotificationIntent>,
}

/// Whether the match moves ratings at all
pub fn is_rated(box_score: &BoxScore) -> bool {
    box_score.match_type == MatchType::Ranked
        && !box_score.outcome.is_voided()
        && box_score.humans().next().is_some()
}

/// Grant placement to a player coming back from a long absence, and apply
/// the soft reset to one who let placement lapse
pub fn refresh_placement(record: &mut RatingRecord, now: DateTime<Utc>) {
    if record.matches_played > 0 && record.days_inactive(now) >= RETURNING_DAYS {
        record.placement_matches_remaining = PLACEMENT_MATCHES;
        record.returning_since = Some(now);
        record.soft_reset_applied = false;
    }
    apply_soft_reset(record, now);
}

/// Apply the lapsed-placement penalty if it is due; returns points removed
pub fn apply_soft_reset(record: &mut RatingRecord, now: DateTime<Utc>) -> i32 {
    let Some(since) = record.returning_since else {
        return 0;
    };
    let days_since_return = (now - since).num_days().max(0) as u32;
    if !placement::soft_reset_due(record.placement_matches_remaining, days_since_return, record.soft_reset_applied) {
        return 0;
    }
    let before = record.rating;
    record.rating = placement::soft_reset(record.rating);
    record.soft_reset_applied = true;
    before - record.rating
}

fn team_ratings(box_score: &BoxScore) -> [f64; 2] {
    Side::both().map(|side| {
        let ratings: Vec<i32> = box_score.players_on(side).map(|p| p.rating_at_start).collect();
        elo::team_rating(&ratings)
    })
}

fn current_record(records: &BTreeMap<PlayerId, RatingRecord>, line: &PlayerLine, now: DateTime<Utc>) -> RatingRecord {
    records
        .get(&line.player_id)
        .cloned()
        .unwrap_or_else(|| RatingRecord::with_rating(line.player_id, line.rating_at_start, now))
}

/// Compute the settlement of a concluded match
///
/// `records` holds the stored rating records of the human participants;
/// a missing record is seeded from the start rating in the box score.
pub fn plan_settlement(
    box_score: &BoxScore,
    records: &BTreeMap<PlayerId, RatingRecord>,
    now: DateTime<Utc>,
) -> SettlementPlan {
    let rated = is_rated(box_score);
    let header = HistoryHeader {
        match_id: box_score.match_id,
        mode: box_score.mode,
        match_type: box_score.match_type,
        duration_ms: box_score.duration_ms,
        settled_at: now,
    };
    let teams = team_ratings(box_score);

    let mut plan = SettlementPlan {
        match_id: box_score.match_id,
        rated,
        records: Vec::new(),
        updates: Vec::new(),
        history: Vec::new(),
        notifications: Vec::new(),
    };

    for line in box_score.humans() {
        let stored = current_record(records, line, now);
        let old_rating = stored.rating;
        let result = HistoryResult::for_side(&box_score.outcome, line.side);

        let actual = match box_score.outcome.actual_for(line.side) {
            Some(actual) if rated => actual,
            _ => {
                plan.history
                    .push(MatchHistoryRow::from_line(line, &header, &box_score.outcome, old_rating, old_rating));
                plan.notifications.push(completed_intent(line.player_id, box_score.match_id, result, old_rating, old_rating, false));
                continue;
            }
        };

        // Written by an earlier attempt that failed part way
        if let Some(old_rating) = stored.settled_from(&box_score.match_id) {
            debug!(match_id = %box_score.match_id, player_id = %line.player_id, "Rating already settled");
            plan.push_settled(line, &header, &box_score.outcome, result, old_rating, stored.rating);
            continue;
        }

        let mut record = stored;
        refresh_placement(&mut record, now);
        let delta = elo::rating_delta(&DeltaInput {
            own_team_rating: teams[line.side.index()],
            opponent_team_rating: teams[line.side.opposite().index()],
            actual,
            matches_played: record.matches_played,
            in_placement: record.in_placement(),
        });
        record.rating = elo::apply_delta(record.rating, delta);
        record.peak_rating = record.peak_rating.max(record.rating);
        record.decay_accumulated = 0;
        record.last_activity_at = now;
        record.last_decay_sweep_at = None;
        if record.in_placement() {
            record.placement_matches_remaining -= 1;
            if !record.in_placement() {
                record.returning_since = None;
            }
        }
        record.matches_played += 1;
        record.last_settlement = Some(LastSettlement {
            match_id: box_score.match_id,
            old_rating,
        });

        let new_rating = record.rating;
        debug!(
            match_id = %box_score.match_id,
            player_id = %line.player_id,
            old_rating,
            new_rating,
            "Rating settled"
        );

        plan.push_settled(line, &header, &box_score.outcome, result, old_rating, new_rating);
        plan.updates.push(record);
    }
    plan
}

impl SettlementPlan {
    fn push_settled(
        &mut self,
        line: &PlayerLine,
        header: &HistoryHeader,
        outcome: &MatchOutcome,
        result: HistoryResult,
        old_rating: i32,
        new_rating: i32,
    ) {
        self.records.push(SettlementRecord {
            player_id: line.player_id,
            old_rating,
            new_rating,
            delta: new_rating - old_rating,
        });
        self.history
            .push(MatchHistoryRow::from_line(line, header, outcome, old_rating, new_rating));
        self.notifications
            .push(completed_intent(line.player_id, self.match_id, result, old_rating, new_rating, true));
        if let Some(intent) = rank_change_intent(line.player_id, old_rating, new_rating) {
            self.notifications.push(intent);
        }
    }
}

fn completed_intent(
    player: PlayerId,
    match_id: MatchId,
    result: HistoryResult,
    old_rating: i32,
    new_rating: i32,
    rated: bool,
) -> NotificationIntent {
    NotificationIntent::new(player, TEMPLATE_SETTLEMENT_COMPLETED)
        .param("match_id", match_id)
        .param("result", result.as_str())
        .param("old_rating", old_rating)
        .param("new_rating", new_rating)
        .param("delta", new_rating - old_rating)
        .param("rated", rated)
}

fn rank_change_intent(player: PlayerId, old_rating: i32, new_rating: i32) -> Option<NotificationIntent> {
    let from = rank_of_rating(old_rating);
    let to = rank_of_rating(new_rating);
    if from == to {
        return None;
    }
    let direction = if to > from { "promoted" } else { "demoted" };
    Some(
        NotificationIntent::new(player, TEMPLATE_RANK_CHANGED)
            .param("from", from)
            .param("to", to)
            .param("direction", direction),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use types::mode::GameMode;
    use types::outcome::{MatchOutcome, TeamLine, WinReason};

    fn line(side: Side, rating: i32, is_bot: bool) -> PlayerLine {
        PlayerLine {
            player_id: PlayerId::new(),
            display_name: "p".to_string(),
            side,
            is_bot,
            rating_at_start: rating,
            score: 500,
            correct: 5,
            answered: 6,
            best_streak: 4,
            total_latency_ms: 12_000,
        }
    }

    fn box_score(match_type: MatchType, outcome: MatchOutcome, players: Vec<PlayerLine>) -> BoxScore {
        let mode = if players.len() > 2 { GameMode::TwoVTwo } else { GameMode::Duel };
        BoxScore {
            match_id: MatchId::new(),
            mode,
            match_type,
            outcome,
            teams: Side::both().map(|side| TeamLine::from_players(side, &players)),
            players,
            duration_ms: 60_000,
        }
    }

    fn a_wins() -> MatchOutcome {
        MatchOutcome::Winner { side: Side::A, reason: WinReason::Score }
    }

    fn established(line: &PlayerLine, now: DateTime<Utc>) -> RatingRecord {
        let mut r = RatingRecord::with_rating(line.player_id, line.rating_at_start, now - Duration::days(2));
        r.matches_played = 40;
        r
    }

    fn records_for(lines: &[&PlayerLine], now: DateTime<Utc>) -> BTreeMap<PlayerId, RatingRecord> {
        lines.iter().map(|l| (l.player_id, established(l, now))).collect()
    }

    #[test]
    fn test_even_duel() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let records = records_for(&[&a, &b], now);
        let score = box_score(MatchType::Ranked, a_wins(), vec![a.clone(), b.clone()]);

        let plan = plan_settlement(&score, &records, now);
        assert!(plan.rated);
        assert_eq!(plan.records[0], SettlementRecord { player_id: a.player_id, old_rating: 1500, new_rating: 1516, delta: 16 });
        assert_eq!(plan.records[1], SettlementRecord { player_id: b.player_id, old_rating: 1500, new_rating: 1484, delta: -16 });
        assert_eq!(plan.history.len(), 2);
        assert_eq!(plan.history[0].result, HistoryResult::Win);
        assert_eq!(plan.history[1].win_reason, Some(WinReason::Score));

        let winner = &plan.updates[0];
        assert_eq!(winner.peak_rating, 1516);
        assert_eq!(winner.matches_played, 41);
        assert_eq!(winner.last_activity_at, now);
        assert_eq!(winner.decay_accumulated, 0);
    }

    #[test]
    fn test_player_already_settled_for_match_is_not_rated_again() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let score = box_score(MatchType::Ranked, a_wins(), vec![a.clone(), b.clone()]);
        let mut records = records_for(&[&a, &b], now);

        let first = plan_settlement(&score, &records, now);
        assert_eq!(first.updates[0].last_settlement.map(|s| s.match_id), Some(score.match_id));
        // Only the winner's write landed
        records.insert(a.player_id, first.updates[0].clone());

        let retry = plan_settlement(&score, &records, now);
        assert_eq!(retry.updates.len(), 1);
        assert_eq!(retry.updates[0].player_id, b.player_id);
        assert_eq!(retry.updates[0].rating, 1484);
        assert_eq!(retry.records, first.records);
        assert_eq!(retry.history, first.history);
        assert_eq!(retry.notifications, first.notifications);
    }

    #[test]
    fn test_bots_count_toward_team_rating_only() {
        let now = Utc::now();
        let me = line(Side::A, 1500, false);
        let mate = line(Side::A, 1100, true);
        let opp = [line(Side::B, 1300, true), line(Side::B, 1300, true)];
        let records = records_for(&[&me], now);
        let score = box_score(MatchType::Ranked, a_wins(), vec![me.clone(), mate, opp[0].clone(), opp[1].clone()]);

        let plan = plan_settlement(&score, &records, now);
        // Both teams average 1300
        assert_eq!(plan.records, vec![SettlementRecord { player_id: me.player_id, old_rating: 1500, new_rating: 1516, delta: 16 }]);
        assert_eq!(plan.history.len(), 1);
        assert_eq!(plan.updates.len(), 1);
    }

    #[test]
    fn test_casual_and_voided_write_history_only() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let records = records_for(&[&a, &b], now);

        let casual = box_score(MatchType::Casual, a_wins(), vec![a.clone(), b.clone()]);
        let voided = box_score(
            MatchType::Ranked,
            MatchOutcome::Voided { reason: "integrity".into() },
            vec![a.clone(), b.clone()],
        );
        for score in [casual, voided] {
            let plan = plan_settlement(&score, &records, now);
            assert!(!plan.rated);
            assert!(plan.records.is_empty());
            assert!(plan.updates.is_empty());
            assert_eq!(plan.history.len(), 2);
            assert!(plan.history.iter().all(|row| row.delta == 0 && row.rating_after == 1500));
            assert!(plan
                .notifications
                .iter()
                .all(|n| n.template_key == TEMPLATE_SETTLEMENT_COMPLETED && n.params["rated"] == "false"));
        }
    }

    #[test]
    fn test_all_bot_match_is_unrated() {
        let score = box_score(MatchType::Ranked, a_wins(), vec![line(Side::A, 1500, true), line(Side::B, 1500, true)]);
        assert!(!is_rated(&score));
        let plan = plan_settlement(&score, &BTreeMap::new(), Utc::now());
        assert!(plan.history.is_empty());
    }

    #[test]
    fn test_provisional_k_for_new_players() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1200, false), line(Side::B, 1200, false));
        let score = box_score(MatchType::Ranked, MatchOutcome::Draw, vec![a.clone(), b]);
        let plan = plan_settlement(&score, &BTreeMap::new(), now);
        assert_eq!(plan.records[0].delta, 0);

        let score = box_score(MatchType::Ranked, a_wins(), vec![a, line(Side::B, 1200, false)]);
        let plan = plan_settlement(&score, &BTreeMap::new(), now);
        assert_eq!(plan.records[0].delta, 20);
        assert_eq!(plan.updates[0].matches_played, 1);
    }

    #[test]
    fn test_returning_player_enters_placement() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let mut records = records_for(&[&a, &b], now);
        if let Some(r) = records.get_mut(&a.player_id) {
            r.last_activity_at = now - Duration::days(75);
        }
        let score = box_score(MatchType::Ranked, a_wins(), vec![a.clone(), b]);

        let plan = plan_settlement(&score, &records, now);
        assert_eq!(plan.records[0].delta, 24);
        let updated = &plan.updates[0];
        assert_eq!(updated.placement_matches_remaining, PLACEMENT_MATCHES - 1);
        assert_eq!(updated.returning_since, Some(now));
        // Opponent was active and plays at normal weight
        assert_eq!(plan.records[1].delta, -16);
    }

    #[test]
    fn test_last_placement_match_clears_return() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let mut records = records_for(&[&a, &b], now);
        if let Some(r) = records.get_mut(&a.player_id) {
            r.placement_matches_remaining = 1;
            r.returning_since = Some(now - Duration::days(3));
        }
        let score = box_score(MatchType::Ranked, a_wins(), vec![a, b]);
        let plan = plan_settlement(&score, &records, now);
        assert!(!plan.updates[0].in_placement());
        assert_eq!(plan.updates[0].returning_since, None);
    }

    #[test]
    fn test_lapsed_placement_soft_resets_once() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1500, false), line(Side::B, 1500, false));
        let mut records = records_for(&[&a, &b], now);
        if let Some(r) = records.get_mut(&a.player_id) {
            r.placement_matches_remaining = 2;
            r.returning_since = Some(now - Duration::days(20));
        }
        let score = box_score(MatchType::Ranked, MatchOutcome::Draw, vec![a, b]);
        let plan = plan_settlement(&score, &records, now);
        let rec = plan.records[0];
        // 100 off for the lapse, then an even draw
        assert_eq!(rec.old_rating, 1500);
        assert_eq!(rec.new_rating, 1400);
        assert!(plan.updates[0].soft_reset_applied);

        let mut again = plan.updates[0].clone();
        assert_eq!(apply_soft_reset(&mut again, now), 0);
    }

    #[test]
    fn test_rank_change_notifies() {
        let now = Utc::now();
        let (a, b) = (line(Side::A, 1395, false), line(Side::B, 1395, false));
        let records = records_for(&[&a, &b], now);
        let score = box_score(MatchType::Ranked, a_wins(), vec![a.clone(), b]);
        let plan = plan_settlement(&score, &records, now);

        let promoted: Vec<_> = plan.notifications.iter().filter(|n| n.template_key == TEMPLATE_RANK_CHANGED).collect();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].user_id, a.player_id);
        assert_eq!(promoted[0].params["direction"], "promoted");
        assert_eq!(promoted[0].params["to"], "Silver III");
    }

    proptest! {
        #[test]
        fn prop_duel_outside_placement_is_zero_sum(
            ra in 300i32..2800,
            rb in 300i32..2800,
            outcome in prop_oneof![Just(0u8), Just(1u8), Just(2u8)],
        ) {
            let now = Utc::now();
            let (a, b) = (line(Side::A, ra, false), line(Side::B, rb, false));
            let records = records_for(&[&a, &b], now);
            let outcome = match outcome {
                0 => a_wins(),
                1 => MatchOutcome::Winner { side: Side::B, reason: WinReason::Accuracy },
                _ => MatchOutcome::Draw,
            };
            let plan = plan_settlement(&box_score(MatchType::Ranked, outcome, vec![a, b]), &records, now);
            let sum: i32 = plan.records.iter().map(|r| r.delta).sum();
            prop_assert!(sum.abs() <= 1);
        }

        #[test]
        fn prop_settlement_never_writes_below_floor(
            ra in 100i32..400,
            rb in 100i32..3000,
            placement in 0u8..=3,
        ) {
            let now = Utc::now();
            let (a, b) = (line(Side::A, ra, false), line(Side::B, rb, false));
            let mut records = records_for(&[&a, &b], now);
            if let Some(r) = records.get_mut(&a.player_id) {
                r.placement_matches_remaining = placement;
                r.returning_since = Some(now);
            }
            let lose = MatchOutcome::Winner { side: Side::B, reason: WinReason::Score };
            let plan = plan_settlement(&box_score(MatchType::Ranked, lose, vec![a, b]), &records, now);
            for update in &plan.updates {
                prop_assert!(update.rating >= elo::RATING_FLOOR);
            }
        }
    }
}

//! Inactivity decay sweep over one rating record
//!
//! The phase a record was last seen in is derived from the previous sweep
//! time, so a phase notification goes out once per transition no matter how
//! often the sweep runs.

use chrono::{DateTime, Utc};
use rules::decay::{self, DecayPhase};
use types::rating::RatingRecord;

use crate::ratings::apply_soft_reset;
use crate::records::{NotificationIntent, TEMPLATE_DECAY_PHASE_CHANGED};

/// What a sweep did to one record
#[derive(Debug, Clone, PartialEq)]
pub struct DecayChange {
    pub record: RatingRecord,
    pub decayed: i32,
    pub soft_reset: i32,
    pub phase_before: DecayPhase,
    pub phase_after: DecayPhase,
}

impl DecayChange {
    pub fn phase_changed(&self) -> bool {
        self.phase_before != self.phase_after
    }

    /// Intent to send for this change, if the new phase has a template
    pub fn notification(&self, now: DateTime<Utc>) -> Option<NotificationIntent> {
        if !self.phase_changed() {
            return None;
        }
        let template = self.phase_after.notification_key()?;
        Some(
            NotificationIntent::new(self.record.player_id, TEMPLATE_DECAY_PHASE_CHANGED)
                .param("phase", phase_name(self.phase_after))
                .param("template", template)
                .param("days_inactive", self.record.days_inactive(now))
                .param("rating", self.record.rating),
        )
    }
}

pub fn phase_name(phase: DecayPhase) -> &'static str {
    match phase {
        DecayPhase::Active => "active",
        DecayPhase::Warning => "warning",
        DecayPhase::Decaying => "decaying",
        DecayPhase::Severe => "severe",
        DecayPhase::Returning => "returning",
    }
}

fn phase_at(record: &RatingRecord, at: Option<DateTime<Utc>>) -> DecayPhase {
    match at {
        Some(at) => decay::decay_phase(record.days_inactive(at)),
        None => DecayPhase::Active,
    }
}

/// Sweep one record; `None` when nothing changed
pub fn sweep_record(record: &RatingRecord, now: DateTime<Utc>) -> Option<DecayChange> {
    let days = record.days_inactive(now);
    let phase_before = phase_at(record, record.last_decay_sweep_at);
    let phase_after = decay::decay_phase(days);

    let mut updated = record.clone();
    let decayed = decay::decay_due(updated.rating, updated.decay_accumulated, days);
    updated.rating -= decayed;
    updated.decay_accumulated += decayed;
    let soft_reset = apply_soft_reset(&mut updated, now);

    if decayed == 0 && soft_reset == 0 && phase_before == phase_after {
        return None;
    }
    updated.last_decay_sweep_at = Some(now);
    Some(DecayChange {
        record: updated,
        decayed,
        soft_reset,
        phase_before,
        phase_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use types::ids::PlayerId;

    fn idle(rating: i32, days: i64, now: DateTime<Utc>) -> RatingRecord {
        let mut r = RatingRecord::with_rating(PlayerId::new(), rating, now - Duration::days(days));
        r.matches_played = 30;
        r
    }

    #[test]
    fn test_active_player_untouched() {
        let now = Utc::now();
        assert!(sweep_record(&idle(1600, 5, now), now).is_none());
    }

    #[test]
    fn test_warning_phase_notifies_without_decay() {
        let now = Utc::now();
        let change = sweep_record(&idle(1600, 15, now), now).unwrap();
        assert_eq!(change.decayed, 0);
        assert_eq!(change.phase_after, DecayPhase::Warning);
        let intent = change.notification(now).unwrap();
        assert_eq!(intent.template_key, TEMPLATE_DECAY_PHASE_CHANGED);
        assert_eq!(intent.params["phase"], "warning");
        assert_eq!(intent.params["template"], "decay.warning");

        // Sweeping again the same day changes nothing
        assert!(sweep_record(&change.record, now).is_none());
    }

    #[test]
    fn test_decay_applies_difference_only() {
        let now = Utc::now();
        let record = idle(1800, 25, now);
        let first = sweep_record(&record, now).unwrap();
        assert_eq!(first.decayed, 25);
        assert_eq!(first.record.rating, 1775);
        assert_eq!(first.record.peak_rating, 1800);
        assert_eq!(first.phase_after, DecayPhase::Decaying);

        let later = now + Duration::days(2);
        let second = sweep_record(&first.record, later).unwrap();
        assert_eq!(second.decayed, 10);
        assert!(!second.phase_changed());
        assert!(second.notification(later).is_none());
    }

    #[test]
    fn test_decay_stops_at_floor() {
        let now = Utc::now();
        let change = sweep_record(&idle(1120, 45, now), now).unwrap();
        assert_eq!(change.record.rating, decay::DECAY_FLOOR);
        assert_eq!(change.phase_after, DecayPhase::Severe);
    }

    #[test]
    fn test_lapsed_placement_reset_by_sweep() {
        let now = Utc::now();
        let mut record = idle(1600, 3, now);
        record.placement_matches_remaining = 2;
        record.returning_since = Some(now - Duration::days(16));
        let change = sweep_record(&record, now).unwrap();
        assert_eq!(change.soft_reset, 100);
        assert_eq!(change.record.rating, 1500);
        assert!(change.record.soft_reset_applied);
    }
}

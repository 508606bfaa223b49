//! Queue entries and join validation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use types::errors::QueueError;
use types::ids::{EntrantId, PlayerId};
use types::mode::{GameMode, MatchType, QueueKey};
use types::participant::{PartyMember, PartyRole};

/// Lifecycle of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Idle,
    Queued,
    /// Paired, waiting for the match-found countdown
    Offered,
    Matched,
    Expired,
    Cancelled,
}

/// Request to join a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub entrant: EntrantId,
    pub key: QueueKey,
    pub members: Vec<PartyMember>,
}

/// An entrant waiting in a rating queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub entrant: EntrantId,
    pub key: QueueKey,
    /// Mean member rating, rounded
    pub rating: i32,
    pub joined_at: i64,
    pub members: Vec<PartyMember>,
    /// Admission order, breaks ties between equal `joined_at`
    pub seq: u64,
}

impl QueueEntry {
    pub fn member_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.members.iter().map(|m| m.id())
    }

    pub fn waited_ms(&self, now: i64) -> i64 {
        (now - self.joined_at).max(0)
    }

    /// Priority key: earliest join, then admission order
    pub fn priority(&self) -> (i64, u64) {
        (self.joined_at, self.seq)
    }
}

/// Mean of member ratings, rounded half away from zero
pub fn party_rating(members: &[PartyMember]) -> i32 {
    if members.is_empty() {
        return 0;
    }
    let sum: i64 = members.iter().map(|m| m.participant.rating() as i64).sum();
    (sum as f64 / members.len() as f64).round() as i32
}

fn invalid(reason: impl Into<String>) -> QueueError {
    QueueError::InvalidParty {
        reason: reason.into(),
    }
}

/// Check party composition for the requested queue
pub fn validate_party(key: &QueueKey, members: &[PartyMember]) -> Result<(), QueueError> {
    if members.is_empty() {
        return Err(invalid("party has no members"));
    }
    if members.iter().any(|m| m.participant.is_bot()) {
        return Err(invalid("bots cannot queue"));
    }

    let mut seen = HashSet::new();
    for member in members {
        if !seen.insert(member.id()) {
            return Err(invalid(format!("duplicate member {}", member.id())));
        }
    }

    let size = key.mode.team_size();
    match (key.mode, key.match_type) {
        (GameMode::Duel, _) => {
            if members.len() != 1 {
                return Err(invalid("duel takes exactly one player"));
            }
        }
        (_, MatchType::Ranked) => {
            if members.len() != size {
                return Err(invalid(format!(
                    "ranked {} needs a full party of {}, got {}",
                    key.mode,
                    size,
                    members.len()
                )));
            }
            if key.mode == GameMode::FiveVFive {
                let igls = members.iter().filter(|m| m.has_role(PartyRole::Igl)).count();
                let anchors = members.iter().filter(|m| m.has_role(PartyRole::Anchor)).count();
                if igls != 1 {
                    return Err(invalid("ranked 5v5 needs exactly one in-game leader"));
                }
                if anchors != 1 {
                    return Err(invalid("ranked 5v5 needs exactly one anchor"));
                }
            }
        }
        (_, MatchType::Casual) => {
            if members.len() > size {
                return Err(invalid(format!(
                    "casual {} takes at most {} players, got {}",
                    key.mode,
                    size,
                    members.len()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::participant::PlayerProfile;

    fn member(rating: i32) -> PartyMember {
        PartyMember::human(PlayerProfile::new(PlayerId::new(), "p", rating))
    }

    fn ranked(mode: GameMode) -> QueueKey {
        QueueKey::new(mode, MatchType::Ranked)
    }

    #[test]
    fn test_party_rating_rounds() {
        assert_eq!(party_rating(&[member(1200), member(1301)]), 1251);
        assert_eq!(party_rating(&[]), 0);
    }

    #[test]
    fn test_duel_needs_one() {
        assert!(validate_party(&ranked(GameMode::Duel), &[member(1200)]).is_ok());
        let err = validate_party(&ranked(GameMode::Duel), &[member(1200), member(1200)]).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_party");
    }

    #[test]
    fn test_ranked_team_needs_full_party() {
        let two = vec![member(1200), member(1200)];
        assert!(validate_party(&ranked(GameMode::TwoVTwo), &two).is_ok());
        assert!(validate_party(&ranked(GameMode::ThreeVThree), &two).is_err());
    }

    #[test]
    fn test_ranked_five_needs_roles() {
        let mut five: Vec<PartyMember> = (0..5).map(|_| member(1500)).collect();
        assert!(validate_party(&ranked(GameMode::FiveVFive), &five).is_err());
        five[0] = five[0].clone().with_role(PartyRole::Igl);
        assert!(validate_party(&ranked(GameMode::FiveVFive), &five).is_err());
        five[4] = five[4].clone().with_role(PartyRole::Anchor);
        assert!(validate_party(&ranked(GameMode::FiveVFive), &five).is_ok());
    }

    #[test]
    fn test_casual_tolerates_partial() {
        let key = QueueKey::new(GameMode::FiveVFive, MatchType::Casual);
        assert!(validate_party(&key, &[member(1200), member(1300)]).is_ok());
        let six: Vec<PartyMember> = (0..6).map(|_| member(1200)).collect();
        assert!(validate_party(&key, &six).is_err());
    }

    #[test]
    fn test_duplicate_members_rejected() {
        let m = member(1200);
        let key = QueueKey::new(GameMode::TwoVTwo, MatchType::Casual);
        assert!(validate_party(&key, &[m.clone(), m]).is_err());
    }
}

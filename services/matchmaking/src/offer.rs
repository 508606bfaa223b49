//! Match offers
//!
//! A pair found by the matching pass is held as an offer for the
//! "match found" countdown before it becomes a match. Offers against bots
//! are due immediately.

use serde::{Deserialize, Serialize};
use types::ids::{EntrantId, MatchId, PlayerId};
use types::mode::QueueKey;
use types::participant::PartyMember;

use crate::entry::QueueEntry;

/// Offer identifier, sequential per matchmaker
pub type OfferId = u64;

/// Who the offered entry plays against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opponent {
    Entry { entry: QueueEntry },
    Bots { members: Vec<PartyMember> },
}

/// Paired entries awaiting delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOffer {
    pub id: OfferId,
    pub key: QueueKey,
    pub entry: QueueEntry,
    pub opponent: Opponent,
    pub created_at: i64,
    pub deliver_at: i64,
}

impl MatchOffer {
    /// Human entrants on the offer
    pub fn entrants(&self) -> Vec<EntrantId> {
        let mut out = vec![self.entry.entrant];
        if let Opponent::Entry { entry } = &self.opponent {
            out.push(entry.entrant);
        }
        out
    }

    pub fn involves(&self, entrant: &EntrantId) -> bool {
        self.entrants().contains(entrant)
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.deliver_at
    }

    pub fn vs_bots(&self) -> bool {
        matches!(self.opponent, Opponent::Bots { .. })
    }
}

/// A delivered offer: everything needed to create the match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFound {
    pub match_id: MatchId,
    pub key: QueueKey,
    /// Side A then side B, each padded to team size
    pub teams: [Vec<PartyMember>; 2],
    pub entrants: Vec<EntrantId>,
    pub vs_bots: bool,
    pub found_at: i64,
}

impl MatchFound {
    /// Human players who should be told about the match
    pub fn human_players(&self) -> Vec<PlayerId> {
        self.teams
            .iter()
            .flatten()
            .filter(|m| !m.participant.is_bot())
            .map(|m| m.id())
            .collect()
    }
}

//! Quit vote
//!
//! `none → open → resolved(quit | stay)`. The final rule is a strict
//! majority of cast ballots, defaulting to stay. The vote resolves early as
//! soon as the remaining eligible voters can no longer change the result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::errors::ActionError;
use types::ids::PlayerId;
use types::mode::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResolution {
    Quit,
    Stay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitVote {
    pub initiator: PlayerId,
    pub side: Side,
    pub eligible: Vec<PlayerId>,
    pub ballots: BTreeMap<PlayerId, bool>,
    pub opened_at: i64,
    pub deadline: i64,
}

impl QuitVote {
    /// Empty vote; the machine records the initiator's ballot separately
    pub fn new(initiator: PlayerId, side: Side, eligible: Vec<PlayerId>, opened_at: i64, deadline: i64) -> Self {
        Self {
            initiator,
            side,
            eligible,
            ballots: BTreeMap::new(),
            opened_at,
            deadline,
        }
    }

    pub fn cast(&mut self, player: PlayerId, yes: bool) -> Result<(), ActionError> {
        if !self.eligible.contains(&player) {
            return Err(ActionError::NotEligible);
        }
        if self.ballots.contains_key(&player) {
            return Err(ActionError::AlreadyVoted);
        }
        self.ballots.insert(player, yes);
        Ok(())
    }

    pub fn yes(&self) -> usize {
        self.ballots.values().filter(|v| **v).count()
    }

    pub fn no(&self) -> usize {
        self.ballots.values().filter(|v| !**v).count()
    }

    /// Eligible voters who have not voted
    pub fn outstanding(&self) -> usize {
        self.eligible.len().saturating_sub(self.ballots.len())
    }

    /// Result once no outstanding ballot could change it
    pub fn early_resolution(&self) -> Option<VoteResolution> {
        let (yes, no, left) = (self.yes(), self.no(), self.outstanding());
        if yes > no + left {
            Some(VoteResolution::Quit)
        } else if yes + left <= no {
            Some(VoteResolution::Stay)
        } else {
            None
        }
    }

    /// Result at the deadline: strict majority of cast ballots, else stay
    pub fn resolve_at_deadline(&self) -> VoteResolution {
        if self.yes() > self.no() {
            VoteResolution::Quit
        } else {
            VoteResolution::Stay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(n: usize) -> (QuitVote, Vec<PlayerId>) {
        let players: Vec<PlayerId> = (0..n).map(|_| PlayerId::new()).collect();
        (QuitVote::new(players[0], Side::A, players.clone(), 0, 30_000), players)
    }

    #[test]
    fn test_three_yes_two_no_quits() {
        let (mut v, p) = vote(5);
        for (i, yes) in [true, false, true, false, true].iter().enumerate() {
            v.cast(p[i], *yes).unwrap();
        }
        assert_eq!(v.early_resolution(), Some(VoteResolution::Quit));
        assert_eq!(v.resolve_at_deadline(), VoteResolution::Quit);
    }

    #[test]
    fn test_two_yes_three_no_stays() {
        let (mut v, p) = vote(5);
        for (i, yes) in [true, false, true, false, false].iter().enumerate() {
            v.cast(p[i], *yes).unwrap();
        }
        assert_eq!(v.early_resolution(), Some(VoteResolution::Stay));
        assert_eq!(v.resolve_at_deadline(), VoteResolution::Stay);
    }

    #[test]
    fn test_zero_ballots_stays() {
        let (v, _) = vote(5);
        assert_eq!(v.early_resolution(), None);
        assert_eq!(v.resolve_at_deadline(), VoteResolution::Stay);
    }

    #[test]
    fn test_resolves_before_everyone_votes() {
        let (mut v, p) = vote(5);
        v.cast(p[0], true).unwrap();
        v.cast(p[1], true).unwrap();
        assert_eq!(v.early_resolution(), None);
        v.cast(p[2], true).unwrap();
        // Three of five already, the other two cannot overturn it
        assert_eq!(v.early_resolution(), Some(VoteResolution::Quit));
    }

    #[test]
    fn test_deadline_tie_stays() {
        let (mut v, p) = vote(5);
        v.cast(p[0], true).unwrap();
        v.cast(p[1], false).unwrap();
        assert_eq!(v.early_resolution(), None);
        assert_eq!(v.resolve_at_deadline(), VoteResolution::Stay);
    }

    #[test]
    fn test_ballot_rules() {
        let (mut v, p) = vote(3);
        v.cast(p[0], true).unwrap();
        assert_eq!(v.cast(p[0], false), Err(ActionError::AlreadyVoted));
        assert_eq!(v.cast(PlayerId::new(), true), Err(ActionError::NotEligible));
    }
}

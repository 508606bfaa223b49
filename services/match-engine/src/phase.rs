//! Match phases and the allowed-transition table
//!
//! Phases only move forward. The active phase alternates with breaks in
//! team relays; every other edge is one-way.

use serde::{Deserialize, Serialize};
use std::fmt;
use types::errors::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Strategy,
    Active,
    Break,
    Halftime,
    PostMatch,
    Ended,
    Voided,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ended | Phase::Voided)
    }

    /// Live play or a pause between rounds
    pub fn in_play(&self) -> bool {
        matches!(self, Phase::Active | Phase::Break | Phase::Halftime)
    }

    pub fn can_transition(&self, to: Phase) -> bool {
        use Phase::*;
        if self.is_terminal() {
            return false;
        }
        // Voids and forfeits end any live match
        if matches!(to, Voided | Ended) {
            return true;
        }
        matches!(
            (self, to),
            (Waiting, Strategy)
                | (Waiting, Active)
                | (Strategy, Active)
                | (Active, Break)
                | (Active, Halftime)
                | (Active, PostMatch)
                | (Break, Active)
                | (Halftime, Active)
        )
    }

    pub fn transition(&self, to: Phase) -> Result<Phase, ActionError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(ActionError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Waiting => "waiting",
            Phase::Strategy => "strategy",
            Phase::Active => "active",
            Phase::Break => "break",
            Phase::Halftime => "halftime",
            Phase::PostMatch => "post_match",
            Phase::Ended => "ended",
            Phase::Voided => "voided",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Phase::*;

    const ALL: [Phase; 8] = [Waiting, Strategy, Active, Break, Halftime, PostMatch, Ended, Voided];

    #[test]
    fn test_forward_edges() {
        assert!(Waiting.can_transition(Strategy));
        assert!(Strategy.can_transition(Active));
        assert!(Active.can_transition(Break));
        assert!(Break.can_transition(Active));
        assert!(Halftime.can_transition(Active));
        assert!(Active.can_transition(PostMatch));
        assert!(PostMatch.can_transition(Ended));
    }

    #[test]
    fn test_regressions_refused() {
        assert!(!Active.can_transition(Strategy));
        assert!(!Active.can_transition(Waiting));
        assert!(!Strategy.can_transition(Waiting));
        assert!(!PostMatch.can_transition(Active));
        assert!(!Break.can_transition(PostMatch));
        let err = Active.transition(Strategy).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
    }

    #[test]
    fn test_void_from_any_live_phase() {
        for phase in ALL.iter().filter(|p| !p.is_terminal()) {
            assert!(phase.can_transition(Voided), "{} -> voided", phase);
            assert!(phase.can_transition(Ended), "{} -> ended", phase);
        }
    }

    #[test]
    fn test_terminal_is_final() {
        for to in ALL {
            assert!(!Ended.can_transition(to));
            assert!(!Voided.can_transition(to));
        }
    }
}

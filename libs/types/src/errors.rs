//! Error types for the arena engine
//!
//! Validation errors carry a stable `reason_code` that is sent to clients
//! verbatim; they never represent faults.

use thiserror::Error;

/// Rejection of a player action by the match state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Action not allowed in phase {phase}")]
    WrongPhase { phase: String },

    #[error("Not this player's turn")]
    NotYourTurn,

    #[error("Question already answered")]
    AlreadyAnswered,

    #[error("Question expired")]
    QuestionExpired,

    #[error("Player is not a member of this match")]
    NotAMember,

    #[error("Player may not {action}")]
    NotPermitted { action: String },

    #[error("Invalid slot assignment: {reason}")]
    InvalidAssignment { reason: String },

    #[error("Slot assignment already locked")]
    SlotsLocked,

    #[error("A quit vote is already open")]
    VoteAlreadyOpen,

    #[error("No quit vote is open")]
    NoOpenVote,

    #[error("Player is not eligible to vote")]
    NotEligible,

    #[error("Ballot already cast")]
    AlreadyVoted,

    #[error("Player is disconnected")]
    Disconnected,

    #[error("Player is already connected")]
    AlreadyConnected,

    #[error("Match not found")]
    MatchNotFound,

    #[error("Match has ended")]
    MatchEnded,

    #[error("Reconnection window closed")]
    ReconnectWindowClosed,

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Match is unavailable")]
    MatchUnavailable,
}

impl ActionError {
    /// Stable machine-readable code sent on rejection
    pub fn reason_code(&self) -> &'static str {
        match self {
            ActionError::WrongPhase { .. } => "wrong_phase",
            ActionError::NotYourTurn => "not_your_turn",
            ActionError::AlreadyAnswered => "already_answered",
            ActionError::QuestionExpired => "question_expired",
            ActionError::NotAMember => "not_a_member",
            ActionError::NotPermitted { .. } => "not_permitted",
            ActionError::InvalidAssignment { .. } => "invalid_assignment",
            ActionError::SlotsLocked => "slots_locked",
            ActionError::VoteAlreadyOpen => "vote_already_open",
            ActionError::NoOpenVote => "no_open_vote",
            ActionError::NotEligible => "not_eligible",
            ActionError::AlreadyVoted => "already_voted",
            ActionError::Disconnected => "disconnected",
            ActionError::AlreadyConnected => "already_connected",
            ActionError::MatchNotFound => "match_not_found",
            ActionError::MatchEnded => "match_ended",
            ActionError::ReconnectWindowClosed => "reconnect_window_closed",
            ActionError::InvalidTransition { .. } => "invalid_transition",
            ActionError::MatchUnavailable => "match_unavailable",
        }
    }
}

/// Rejection of a matchmaking request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Entrant already queued: {entrant}")]
    AlreadyQueued { entrant: String },

    #[error("Entrant not queued")]
    NotQueued,

    #[error("Invalid party: {reason}")]
    InvalidParty { reason: String },

    #[error("Matchmaking queue unavailable")]
    Unavailable,
}

impl QueueError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            QueueError::AlreadyQueued { .. } => "already_queued",
            QueueError::NotQueued => "not_queued",
            QueueError::InvalidParty { .. } => "invalid_party",
            QueueError::Unavailable => "queue_unavailable",
        }
    }
}

//! Arena rules
//!
//! Pure, synchronous functions shared by matchmaking, the match engine and
//! settlement. Nothing here performs I/O or holds state, so every function
//! is safe to call from any task without coordination.
//!
//! # Modules
//! - `rank`: rating → {tier, division}
//! - `decay`: inactivity phases and decay amounts
//! - `placement`: placement-mode multiplier and soft reset
//! - `scoring`: per-answer points and the winner tiebreak cascade
//! - `relay`: relay turn resolution
//! - `elo`: expected score and rating deltas

pub mod decay;
pub mod elo;
pub mod placement;
pub mod rank;
pub mod relay;
pub mod scoring;

pub use rank::{rank_of, rank_of_rating, Division, Rank, Tier};
pub use relay::{resolve_active_player, SlotAssignment, Takeover, TurnOrder};
pub use scoring::{decide_winner, score_answer, AnswerScore, DecidedBy, Decision};

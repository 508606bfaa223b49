//! Types library for the arena match coordination engine
//!
//! This library provides the core type definitions shared by matchmaking,
//! the live match engine, settlement and the gateway.
//!
//! # Modules
//! - `ids`: Unique identifiers (PlayerId, PartyId, MatchId, EntrantId)
//! - `mode`: Game modes, match types, queue keys and sides
//! - `participant`: Human and synthetic participants, party roles
//! - `question`: Operation categories and questions
//! - `rating`: Durable rating records
//! - `outcome`: Match outcomes and box scores
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod mode;
pub mod participant;
pub mod question;
pub mod rating;
pub mod outcome;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::mode::*;
    pub use crate::participant::*;
    pub use crate::question::*;
    pub use crate::rating::*;
    pub use crate::outcome::*;
    pub use crate::errors::*;
}

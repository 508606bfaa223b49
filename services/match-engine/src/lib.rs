//! Match Engine
//!
//! Live arena matches: the synchronous match state machine, the per-match
//! actor that drives it, connection integrity monitoring, and the registry
//! and supervisor that keep matches isolated from each other.
//!
//! **Key Invariants:**
//! - One task owns each match's state; nothing else mutates it
//! - Events carry a per-match sequence that only grows
//! - A crashed match is voided without touching any other match

pub mod actions;
pub mod actor;
pub mod bot;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod integrity;
pub mod machine;
pub mod phase;
pub mod ports;
pub mod questions;
pub mod quit_vote;
pub mod registry;
pub mod state;
pub mod supervisor;
pub mod view;

pub use actions::{ActionOutcome, AnswerResult, MatchAction};
pub use actor::{ActorContext, MatchActor, MatchHandle};
pub use checkpoint::Checkpoint;
pub use clock::EngineClock;
pub use config::{EngineConfig, IntegrityConfig, MatchConfig};
pub use effects::{retry_with_backoff, RetryPolicy};
pub use error::EngineError;
pub use events::{Audience, Envelope, EventPayload, MatchEvent};
pub use integrity::LinkState;
pub use machine::MatchMachine;
pub use phase::Phase;
pub use ports::{CheckpointStore, MemoryCheckpointStore, RecordingTransport, Transport};
pub use registry::MatchRegistry;
pub use state::{MatchSetup, MatchState};
pub use supervisor::{MatchSupervisor, ResumeReport};
pub use view::MatchSnapshot;

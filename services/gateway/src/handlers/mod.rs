pub mod queue;
pub mod rank;
pub mod ws;

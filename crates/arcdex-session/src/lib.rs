//! arcdex-session
//!
//! Orchestration on top of the engines: [`IndexingSession`] drives one
//! background build at a time and publishes it atomically, and
//! [`SearchController`] turns raw user input into a [`SearchOutcome`].
//!
//! [`SearchOutcome`]: arcdex_core::types::SearchOutcome

pub mod controller;
pub mod session;

pub use controller::SearchController;
pub use session::{IndexingEvent, IndexingRun, IndexingSession, SessionState};

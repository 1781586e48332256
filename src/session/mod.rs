//! Session orchestration.
//!
//! # Architecture
//!
//! - [`SessionBuilder`] — validates the section and wires the collaborators
//! - [`SessionOrchestrator`] — the single event loop driving phases, timers,
//!   playback, capture, and finalization
//! - [`SessionHandle`] — actions in, events out, for the embedding layer
//! - [`events`] — the outbound event and inbound action vocabulary

pub mod events;
pub mod orchestrator;

pub use events::{FinalizeOutcome, SessionEvent, UserAction};
pub use orchestrator::{
    CaptureRetryPolicy, SessionBuilder, SessionHandle, SessionOrchestrator, SessionOutcome,
};

//! Phase vocabulary, per-kind phase graphs, and the transition core.
//!
//! # Architecture
//!
//! - [`Phase`] — the stage vocabulary shared by every task kind
//! - [`resolve`] — pure mapping from a task descriptor to its phase sequence
//! - [`PhaseMachine`] — walks one task's sequence, enforcing the playback
//!   guard and the capture retry path

pub mod graph;
pub mod machine;

pub use graph::{Phase, resolve};
pub use machine::{AdvanceBlocked, PhaseMachine, PhaseTransition, TransitionReason};

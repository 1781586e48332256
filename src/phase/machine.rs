//! Phase transition core.
//!
//! [`PhaseMachine`] walks the sequence produced by the resolver, one task at
//! a time. It owns the per-task state the orchestrator must never infer from
//! anywhere else: the cursor, the stimulus-has-played flag, and the capture
//! attempt count. The orchestrator interprets transitions into side effects
//! (timers, playback, capture); the machine itself is pure and synchronous.

use thiserror::Error;
use tracing::{debug, info};

use super::graph::Phase;

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// A fixed-duration phase's countdown elapsed
    TimerExpired,
    /// The audio stimulus finished playing
    StimulusFinished,
    /// Capture produced a non-empty artifact
    CaptureStored,
    /// Capture ended empty or errored; retrying from Preparation
    CaptureRejected,
    /// Explicit user action
    ManualAdvance,
    /// Phase skipped because the configuration lacks its stimulus
    ConfigDefect,
}

/// Record of a single phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Phase we left
    pub from: Phase,
    /// Phase we entered
    pub to: Phase,
    /// What caused the move
    pub reason: TransitionReason,
}

/// Reasons a manual advance request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdvanceBlocked {
    /// The stimulus must finish before the task may continue
    #[error("stimulus has not finished playing")]
    StimulusNotFinished,

    /// Recording must be stopped, not skipped
    #[error("capture in progress; stop the recording instead")]
    CaptureActive,

    /// The task is already complete; advancing tasks is the orchestrator's job
    #[error("task already complete")]
    TaskComplete,
}

/// Walks one task's resolved phase sequence in order.
#[derive(Debug)]
pub struct PhaseMachine {
    sequence: Vec<Phase>,
    cursor: usize,
    stimulus_played: bool,
    capture_attempts: u32,
}

impl PhaseMachine {
    /// Creates a machine positioned at the first phase of `sequence`.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is empty or does not end in [`Phase::Completed`]
    /// — the resolver never produces such a sequence.
    #[must_use]
    pub fn new(sequence: Vec<Phase>) -> Self {
        assert!(
            sequence.last() == Some(&Phase::Completed),
            "phase sequence must end in Completed"
        );
        Self {
            sequence,
            cursor: 0,
            stimulus_played: false,
            capture_attempts: 0,
        }
    }

    /// The phase the task is currently in.
    #[must_use]
    pub fn current(&self) -> Phase {
        self.sequence[self.cursor]
    }

    /// The full resolved sequence for this task.
    #[must_use]
    pub fn sequence(&self) -> &[Phase] {
        &self.sequence
    }

    /// Whether the task has reached its terminal phase.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current() == Phase::Completed
    }

    /// Whether the task's audio stimulus has played to completion.
    #[must_use]
    pub const fn stimulus_played(&self) -> bool {
        self.stimulus_played
    }

    /// Records that the audio stimulus played to completion.
    pub fn mark_stimulus_played(&mut self) {
        self.stimulus_played = true;
    }

    /// Number of capture attempts started for this task so far.
    #[must_use]
    pub const fn capture_attempts(&self) -> u32 {
        self.capture_attempts
    }

    /// Counts a new capture attempt and returns its 1-based number.
    pub fn begin_capture_attempt(&mut self) -> u32 {
        self.capture_attempts += 1;
        self.capture_attempts
    }

    /// Moves to the next phase in the sequence.
    ///
    /// Returns `None` when the task is already complete.
    pub fn advance(&mut self, reason: TransitionReason) -> Option<PhaseTransition> {
        if self.is_complete() {
            debug!("advance on completed task is a no-op");
            return None;
        }
        let from = self.current();
        self.cursor += 1;
        let to = self.current();
        info!(%from, %to, ?reason, "phase transition");
        Some(PhaseTransition { from, to, reason })
    }

    /// Attempts a user-driven advance, enforcing the playback guard.
    ///
    /// A manual action must never skip past an unfinished Listening phase,
    /// and cannot short-circuit an active recording or a completed task.
    ///
    /// # Errors
    ///
    /// Returns the reason the advance is refused.
    pub fn try_manual_advance(&mut self) -> Result<PhaseTransition, AdvanceBlocked> {
        match self.current() {
            Phase::Listening if !self.stimulus_played => Err(AdvanceBlocked::StimulusNotFinished),
            Phase::Capturing => Err(AdvanceBlocked::CaptureActive),
            Phase::Completed => Err(AdvanceBlocked::TaskComplete),
            _ => Ok(self
                .advance(TransitionReason::ManualAdvance)
                .expect("non-terminal phase always advances")),
        }
    }

    /// Returns the task to the Preparation phase after a rejected capture.
    ///
    /// # Panics
    ///
    /// Panics if the sequence lacks a Preparation phase — the resolver always
    /// includes one.
    pub fn return_to_preparation(&mut self, reason: TransitionReason) -> PhaseTransition {
        let from = self.current();
        self.cursor = self
            .sequence
            .iter()
            .position(|p| *p == Phase::Preparation)
            .expect("every phase sequence contains Preparation");
        info!(%from, to = %Phase::Preparation, ?reason, "phase transition");
        PhaseTransition {
            from,
            to: Phase::Preparation,
            reason,
        }
    }
}

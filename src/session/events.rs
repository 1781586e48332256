//! Session events and user actions.
//!
//! Events flow outward on a broadcast channel so rendering can subscribe
//! without ever driving transitions itself; actions flow inward through the
//! session handle.

use crate::capture::CaptureFailure;
use crate::config::schema::TaskId;
use crate::phase::Phase;
use crate::store::ResponseArtifact;
use crate::submit::SubmissionReceipt;

/// Outcome of a finalize attempt.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// The sink acknowledged the session
    Submitted {
        /// The sink's acknowledgment
        receipt: SubmissionReceipt,
    },
    /// The completeness invariant failed; the sink was not called
    MissingResponses {
        /// Tasks without a stored response, in section order
        tasks: Vec<TaskId>,
    },
    /// The sink rejected the session; the store is retained for retry
    SubmissionFailed {
        /// The sink's error
        reason: String,
    },
}

/// Events emitted by the session for the rendering layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The current task entered a new phase
    PhaseChanged {
        /// Task the phase belongs to
        task: TaskId,
        /// The phase entered
        phase: Phase,
    },

    /// Stimulus playback failed; the phase is re-offered
    StimulusFailed {
        /// Task whose stimulus failed
        task: TaskId,
        /// Playback error description
        reason: String,
    },

    /// A capture attempt ended without a usable response; the task returned
    /// to Preparation
    CaptureRejected {
        /// Task whose capture was rejected
        task: TaskId,
        /// Why the attempt produced nothing
        failure: CaptureFailure,
        /// 1-based attempt number
        attempt: u32,
    },

    /// The configured capture retry budget is spent; capture now requires an
    /// explicit begin action
    CaptureRetriesExhausted {
        /// Task out of retries
        task: TaskId,
        /// Attempts made
        attempts: u32,
    },

    /// A task finished with a stored response; the artifact is included for
    /// playback review before advancing
    TaskCompleted {
        /// The completed task
        task: TaskId,
        /// The stored response
        artifact: ResponseArtifact,
    },

    /// A finalize attempt concluded
    SessionFinalized {
        /// What happened
        outcome: FinalizeOutcome,
    },
}

/// Actions the embedding layer can send into a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Advance: within a task, a guarded manual phase advance; on a
    /// completed task, moves to the next task (or finalizes after the last)
    Advance,

    /// Start recording now, without waiting out the preparation countdown
    BeginCapture,

    /// End the recording early
    StopCapture,

    /// Replay the audio stimulus (retry a failed playback, or review it
    /// during preparation)
    ReplayStimulus,

    /// Abandon the current task and switch to the task at this index;
    /// any partial recording is discarded
    JumpToTask(usize),

    /// Check completeness and submit
    Finalize,

    /// Tear the session down without submitting
    EndSession,
}

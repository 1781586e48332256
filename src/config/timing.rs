//! Per-kind stage durations.
//!
//! The durations are fixed design constants of the exercise format, not user
//! input. Per-task overrides exist only for preparation and response windows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::{TaskConfig, TaskKind};
use crate::phase::Phase;

/// Stage durations for one task kind, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTimings {
    /// Orientation ("get ready") screen
    pub orientation_secs: u64,
    /// Question preview before preparation (independent tasks)
    pub question_preview_secs: u64,
    /// Reading passage window
    pub reading_secs: u64,
    /// Question reveal after the stimulus
    pub question_reveal_secs: u64,
    /// Preparation window
    pub preparation_secs: u64,
    /// Response (recording) window
    pub response_secs: u64,
}

/// Durations for every task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingTable {
    /// Timings for [`TaskKind::Independent`]
    pub independent: KindTimings,
    /// Timings for [`TaskKind::ReadingListening`]
    pub reading_listening: KindTimings,
    /// Timings for [`TaskKind::ListeningOnly`]
    pub listening_only: KindTimings,
    /// Timings for [`TaskKind::Generic`]
    pub generic: KindTimings,
}

impl Default for TimingTable {
    fn default() -> Self {
        Self {
            independent: KindTimings {
                orientation_secs: 5,
                question_preview_secs: 5,
                reading_secs: 45,
                question_reveal_secs: 5,
                preparation_secs: 15,
                response_secs: 45,
            },
            reading_listening: KindTimings {
                orientation_secs: 5,
                question_preview_secs: 5,
                reading_secs: 45,
                question_reveal_secs: 5,
                preparation_secs: 30,
                response_secs: 60,
            },
            listening_only: KindTimings {
                orientation_secs: 5,
                question_preview_secs: 5,
                reading_secs: 45,
                question_reveal_secs: 5,
                preparation_secs: 20,
                response_secs: 60,
            },
            generic: KindTimings {
                orientation_secs: 5,
                question_preview_secs: 5,
                reading_secs: 45,
                question_reveal_secs: 5,
                preparation_secs: 30,
                response_secs: 60,
            },
        }
    }
}

impl TimingTable {
    /// Timings for the given kind.
    #[must_use]
    pub const fn for_kind(&self, kind: TaskKind) -> &KindTimings {
        match kind {
            TaskKind::Independent => &self.independent,
            TaskKind::ReadingListening => &self.reading_listening,
            TaskKind::ListeningOnly => &self.listening_only,
            TaskKind::Generic => &self.generic,
        }
    }

    /// Duration of a fixed-length phase for the given task.
    ///
    /// Task-level overrides take precedence for preparation and response
    /// windows. Returns `None` for event-driven and terminal phases
    /// (Listening, Completed).
    #[must_use]
    pub fn phase_duration(&self, task: &TaskConfig, phase: Phase) -> Option<Duration> {
        let timings = self.for_kind(task.kind);
        let secs = match phase {
            Phase::Orientation => timings.orientation_secs,
            Phase::QuestionPreview => timings.question_preview_secs,
            Phase::Reading => timings.reading_secs,
            Phase::QuestionReveal => timings.question_reveal_secs,
            Phase::Preparation => task.preparation_secs.unwrap_or(timings.preparation_secs),
            Phase::Capturing => task.response_secs.unwrap_or(timings.response_secs),
            Phase::Listening | Phase::Completed => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

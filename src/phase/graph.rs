//! Phase vocabulary and the per-task-kind phase graph resolver.
//!
//! `resolve` is a pure function from a task descriptor to the ordered list of
//! phases that task will visit. The state machine itself is kind-agnostic;
//! all per-kind branching lives in this table.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::schema::{TaskConfig, TaskKind};

/// A named stage within a task's timed lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// "Get ready" screen before the task proper
    Orientation,
    /// Question shown before preparation (independent tasks)
    QuestionPreview,
    /// Reading passage window
    Reading,
    /// Audio stimulus playback
    Listening,
    /// Question shown after the stimulus
    QuestionReveal,
    /// Preparation window; expiry starts capture automatically
    Preparation,
    /// Response recording window
    Capturing,
    /// Terminal state for the task
    Completed,
}

impl Phase {
    /// Whether this phase presents a stimulus to the user.
    #[must_use]
    pub const fn is_stimulus(self) -> bool {
        matches!(self, Self::Reading | Self::Listening)
    }

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::QuestionPreview => "question_preview",
            Self::Reading => "reading",
            Self::Listening => "listening",
            Self::QuestionReveal => "question_reveal",
            Self::Preparation => "preparation",
            Self::Capturing => "capturing",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the ordered phase sequence for a task.
///
/// Stimulus phases are elided when the corresponding field is absent. A kind
/// that declares a stimulus it does not carry is a configuration defect: the
/// phase is skipped with a warning rather than failing the session.
#[must_use]
pub fn resolve(task: &TaskConfig) -> Vec<Phase> {
    let mut phases = vec![Phase::Orientation];

    match task.kind {
        TaskKind::Independent => phases.push(Phase::QuestionPreview),
        TaskKind::ReadingListening => {
            push_reading(&mut phases, task);
            push_listening(&mut phases, task);
            phases.push(Phase::QuestionReveal);
        }
        TaskKind::ListeningOnly => {
            push_listening(&mut phases, task);
            phases.push(Phase::QuestionReveal);
        }
        TaskKind::Generic => {
            if task.passage.is_some() {
                phases.push(Phase::Reading);
            }
            if task.audio.is_some() {
                phases.push(Phase::Listening);
            }
        }
    }

    phases.extend([Phase::Preparation, Phase::Capturing, Phase::Completed]);
    phases
}

fn push_reading(phases: &mut Vec<Phase>, task: &TaskConfig) {
    if task.passage.is_some() {
        phases.push(Phase::Reading);
    } else {
        warn!(
            task = %task.id,
            kind = %task.kind,
            "task declares a reading passage but carries none; skipping reading phase"
        );
    }
}

fn push_listening(phases: &mut Vec<Phase>, task: &TaskConfig) {
    if task.audio.is_some() {
        phases.push(Phase::Listening);
    } else {
        warn!(
            task = %task.id,
            kind = %task.kind,
            "task declares an audio stimulus but carries none; skipping listening phase"
        );
    }
}

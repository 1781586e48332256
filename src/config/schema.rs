//! Section and task descriptor types.
//!
//! These types are handed to the orchestrator by the configuration source
//! (typically deserialized from YAML via [`crate::config::loader`]). They are
//! immutable for the lifetime of a session.

use serde::{Deserialize, Serialize};

/// Identifier of a single task within a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a section (one proctored sitting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an audio stimulus.
///
/// Resolution to a playable resource is the player backend's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusRef(pub String);

impl std::fmt::Display for StimulusRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind tag of a task. Determines the phase sequence and which optional
/// stimulus fields must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Prompt only, no stimulus
    Independent,
    /// Reading passage followed by an audio clip
    ReadingListening,
    /// Audio clip only
    ListeningOnly,
    /// Fallback: stimulus phases included per present fields
    Generic,
}

impl TaskKind {
    /// Whether this kind declares a reading passage as part of its shape.
    #[must_use]
    pub const fn declares_passage(self) -> bool {
        matches!(self, Self::ReadingListening)
    }

    /// Whether this kind declares an audio stimulus as part of its shape.
    #[must_use]
    pub const fn declares_audio(self) -> bool {
        matches!(self, Self::ReadingListening | Self::ListeningOnly)
    }

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::ReadingListening => "reading_listening",
            Self::ListeningOnly => "listening_only",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-task descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task identifier, unique within the section
    pub id: TaskId,

    /// Position of the task within the section (1-based)
    pub ordinal: u32,

    /// Kind tag
    pub kind: TaskKind,

    /// Reading passage text, when the task presents one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,

    /// Audio stimulus reference, when the task presents one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<StimulusRef>,

    /// Question prompt text
    pub prompt: String,

    /// Override for the kind's preparation duration, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_secs: Option<u64>,

    /// Override for the kind's response duration, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_secs: Option<u64>,
}

/// An ordered list of tasks making up one proctored sitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Section identifier
    pub id: SectionId,

    /// Human-readable title
    pub title: String,

    /// Tasks in presentation order
    pub tasks: Vec<TaskConfig>,
}

impl SectionConfig {
    /// Ids of all tasks, in presentation order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// Position of the task with the given id, if present.
    #[must_use]
    pub fn index_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

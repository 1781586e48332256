//! Response artifact store.
//!
//! One artifact per task, keyed by task id, in insertion order. Overwriting
//! on retry is allowed while the session runs; the store freezes when
//! submission begins and refuses every later write. Empty artifacts are
//! unrepresentable: the constructors refuse zero-byte payloads.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::config::schema::TaskId;
use crate::error::StoreError;

/// A recorded response: opaque bytes plus a declared media type.
///
/// Always non-empty; construct via [`ResponseArtifact::new`] or
/// [`ResponseArtifact::from_chunks`], which refuse zero-byte payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseArtifact {
    data: Bytes,
    media_type: String,
    recorded_at: DateTime<Utc>,
}

impl ResponseArtifact {
    /// Wraps a non-empty payload. Returns `None` for zero bytes.
    #[must_use]
    pub fn new(data: Bytes, media_type: impl Into<String>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            data,
            media_type: media_type.into(),
            recorded_at: Utc::now(),
        })
    }

    /// Concatenates capture chunks into one artifact. Returns `None` when the
    /// chunks sum to zero bytes.
    #[must_use]
    pub fn from_chunks(chunks: &[Bytes], media_type: impl Into<String>) -> Option<Self> {
        let total: usize = chunks.iter().map(Bytes::len).sum();
        if total == 0 {
            return None;
        }
        let mut buf = BytesMut::with_capacity(total);
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }
        Self::new(buf.freeze(), media_type)
    }

    /// The recorded payload.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes. Always greater than zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Declared media type, e.g. `audio/webm`.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// When the artifact was finalized.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Per-session map from task id to response artifact.
#[derive(Debug, Default)]
pub struct ResponseStore {
    entries: IndexMap<TaskId, ResponseArtifact>,
    frozen: bool,
}

impl ResponseStore {
    /// Creates an empty, unfrozen store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the artifact for `task`, replacing any earlier attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Frozen`] once submission has begun.
    pub fn insert(&mut self, task: TaskId, artifact: ResponseArtifact) -> Result<(), StoreError> {
        if self.frozen {
            return Err(StoreError::Frozen);
        }
        if self.entries.insert(task, artifact).is_some() {
            debug!(%task, "response overwritten on retry");
        }
        Ok(())
    }

    /// The stored artifact for `task`, if any.
    #[must_use]
    pub fn get(&self, task: TaskId) -> Option<&ResponseArtifact> {
        self.entries.get(&task)
    }

    /// Whether `task` has a stored response.
    #[must_use]
    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.contains_key(&task)
    }

    /// Number of stored responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no responses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Task ids from `expected` that have no stored response, in order.
    #[must_use]
    pub fn missing_from(&self, expected: &[TaskId]) -> Vec<TaskId> {
        expected
            .iter()
            .copied()
            .filter(|task| !self.entries.contains_key(task))
            .collect()
    }

    /// Marks the store read-only. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether submission has begun.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Iterates stored responses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &ResponseArtifact)> {
        self.entries.iter().map(|(task, artifact)| (*task, artifact))
    }
}

//! Error types for `viva-session`.
//!
//! Domain-specific error enums aggregated under a transparent top-level
//! [`SessionError`]. Capture- and playback-level failures are handled inside
//! the session loop and never unwind past the orchestrator; only
//! configuration and finalize-level errors surface to callers.

use thiserror::Error;

use crate::config::schema::TaskId;
use crate::config::validation::ValidationIssue;

/// Top-level error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Capture device error
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Stimulus playback error
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Finalization error
    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    /// Response store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Section/task configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Validation produced at least one error-severity issue
    #[error("section validation failed with {} issue(s)", errors.len())]
    ValidationError {
        /// The issues found, errors and warnings alike
        errors: Vec<ValidationIssue>,
    },
}

/// Capture device errors.
///
/// All variants are recoverable at the session level: the controller returns
/// the task to Preparation and surfaces a retryable warning.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The runtime refused access to the capture device
    #[error("capture device access denied: {0}")]
    PermissionDenied(String),

    /// No capture device is available
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device failed mid-recording
    #[error("capture device lost: {0}")]
    DeviceLost(String),
}

/// Stimulus playback errors.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Playback could not start or aborted mid-clip
    #[error("stimulus playback failed: {0}")]
    Failed(String),

    /// The stimulus reference could not be resolved to a playable resource
    #[error("stimulus not resolvable: {0}")]
    Unresolvable(String),
}

/// Finalization errors.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// The completeness invariant does not hold
    #[error("missing responses for {} task(s)", .0.len())]
    MissingResponses(Vec<TaskId>),

    /// The submission sink rejected the session
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// Finalize called after a successful submission
    #[error("session already submitted")]
    AlreadySubmitted,
}

/// Response store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was frozen by a submission attempt
    #[error("response store is frozen; no further writes permitted")]
    Frozen,
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

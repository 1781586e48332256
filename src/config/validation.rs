//! Section configuration validation.
//!
//! Errors make the section unusable and abort orchestrator construction.
//! Warnings describe configuration defects the session can survive (the
//! resolver elides the affected phases); they are logged and surfaced to the
//! caller.

use crate::config::schema::SectionConfig;
use crate::error::ConfigError;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The section cannot be run
    Error,
    /// The section can run with degraded behavior (phase elided)
    Warning,
}

/// A single issue found during section validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g. `tasks[2].audio`)
    pub path: String,
    /// Description of the issue
    pub message: String,
    /// Severity level
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Validates a section configuration, returning every issue found.
#[must_use]
pub fn validate(section: &SectionConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if section.tasks.is_empty() {
        issues.push(ValidationIssue {
            path: "tasks".to_string(),
            message: "section has no tasks".to_string(),
            severity: Severity::Error,
        });
        return issues;
    }

    let mut seen_ordinals = std::collections::BTreeSet::new();
    let mut seen_ids = std::collections::BTreeSet::new();

    for (i, task) in section.tasks.iter().enumerate() {
        let at = |field: &str| format!("tasks[{i}].{field}");

        if !seen_ordinals.insert(task.ordinal) {
            issues.push(ValidationIssue {
                path: at("ordinal"),
                message: format!("duplicate ordinal {}", task.ordinal),
                severity: Severity::Error,
            });
        }
        if !seen_ids.insert(task.id) {
            issues.push(ValidationIssue {
                path: at("id"),
                message: format!("duplicate task id {}", task.id),
                severity: Severity::Error,
            });
        }

        if task.prompt.trim().is_empty() {
            issues.push(ValidationIssue {
                path: at("prompt"),
                message: "prompt is empty".to_string(),
                severity: Severity::Warning,
            });
        }

        if task.kind.declares_passage() && task.passage.is_none() {
            issues.push(ValidationIssue {
                path: at("passage"),
                message: format!("kind '{}' declares a reading passage but none is set", task.kind),
                severity: Severity::Warning,
            });
        }
        if task.kind.declares_audio() && task.audio.is_none() {
            issues.push(ValidationIssue {
                path: at("audio"),
                message: format!("kind '{}' declares an audio stimulus but none is set", task.kind),
                severity: Severity::Warning,
            });
        }

        if task.response_secs == Some(0) {
            issues.push(ValidationIssue {
                path: at("response_secs"),
                message: "response window of zero seconds makes capture impossible".to_string(),
                severity: Severity::Error,
            });
        }
    }

    issues
}

/// Validates a section and splits the outcome: error-severity issues abort
/// with [`ConfigError::ValidationError`], warnings are returned for logging.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` carrying every issue when at least
/// one has [`Severity::Error`].
pub fn ensure_valid(section: &SectionConfig) -> Result<Vec<ValidationIssue>, ConfigError> {
    let issues = validate(section);
    if issues.iter().any(|i| i.severity == Severity::Error) {
        return Err(ConfigError::ValidationError { errors: issues });
    }
    Ok(issues)
}

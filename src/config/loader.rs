//! Section configuration loading.
//!
//! Loads a [`SectionConfig`] from YAML, sorts tasks into presentation order,
//! and runs validation. Warnings survive loading and are returned alongside
//! the configuration so the caller can log or display them.

use std::path::Path;

use tracing::warn;

use crate::config::schema::SectionConfig;
use crate::config::validation::{self, ValidationIssue};
use crate::error::{Result, SessionError};

/// Result of loading a section configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The validated section, tasks sorted by ordinal.
    pub section: SectionConfig,
    /// Warning-severity issues found during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Loads a section from YAML text.
///
/// # Errors
///
/// Returns a YAML error when parsing fails, or a configuration error when
/// validation finds error-severity issues.
pub fn from_yaml_str(text: &str) -> Result<LoadResult> {
    let mut section: SectionConfig = serde_yaml::from_str(text)?;
    section.tasks.sort_by_key(|t| t.ordinal);

    let warnings = validation::ensure_valid(&section).map_err(SessionError::Config)?;
    for issue in &warnings {
        warn!(%issue, "section configuration defect");
    }

    Ok(LoadResult { section, warnings })
}

/// Loads a section from a YAML file.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be read, plus everything
/// [`from_yaml_str`] can return.
pub fn from_path(path: &Path) -> Result<LoadResult> {
    let text = std::fs::read_to_string(path)?;
    from_yaml_str(&text)
}

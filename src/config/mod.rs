//! Section and task configuration: schema, timings, validation, loading.

pub mod loader;
pub mod schema;
pub mod timing;
pub mod validation;

pub use loader::{LoadResult, from_path, from_yaml_str};
pub use schema::{SectionConfig, SectionId, StimulusRef, TaskConfig, TaskId, TaskKind};
pub use timing::{KindTimings, TimingTable};
pub use validation::{Severity, ValidationIssue};

//! Submission sink seam.
//!
//! The orchestrator calls the sink exactly once per successful session, only
//! after the completeness invariant holds. A failed submission leaves the
//! response store intact so finalize can be retried without re-recording.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::schema::SectionConfig;
use crate::error::FinalizeError;
use crate::store::ResponseStore;

/// Acknowledgment returned by a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// Sink-provided message, when one is returned
    pub message: Option<String>,
    /// When the submission was acknowledged
    pub submitted_at: DateTime<Utc>,
}

/// Accepts a complete session's responses as one atomic call.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Submits every response for the section.
    ///
    /// # Errors
    ///
    /// Returns [`FinalizeError::SubmissionFailed`] when the sink rejects the
    /// session; the caller retains the store and may retry.
    async fn submit(
        &self,
        section: &SectionConfig,
        responses: &ResponseStore,
    ) -> Result<SubmissionReceipt, FinalizeError>;
}

/// HTTP sink posting a multipart form to the grading backend.
///
/// Each response becomes a `task{ordinal}Recording` part, matching the
/// backend's `/speaking/<section>/submit` endpoint.
#[derive(Debug, Clone)]
pub struct HttpSubmissionSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmissionSink {
    /// Creates a sink targeting the given backend base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn file_name(ordinal: u32, media_type: &str) -> String {
        let ext = media_type.rsplit('/').next().unwrap_or("bin");
        format!("task{ordinal}.{ext}")
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(
        &self,
        section: &SectionConfig,
        responses: &ResponseStore,
    ) -> Result<SubmissionReceipt, FinalizeError> {
        let mut form = reqwest::multipart::Form::new();
        for task in &section.tasks {
            let artifact = responses.get(task.id).ok_or_else(|| {
                FinalizeError::SubmissionFailed(format!("no response stored for task {}", task.id))
            })?;
            let part = reqwest::multipart::Part::bytes(artifact.data().to_vec())
                .file_name(Self::file_name(task.ordinal, artifact.media_type()))
                .mime_str(artifact.media_type())
                .map_err(|e| FinalizeError::SubmissionFailed(e.to_string()))?;
            form = form.part(format!("task{}Recording", task.ordinal), part);
        }

        let url = format!(
            "{}/speaking/{}/submit",
            self.base_url.trim_end_matches('/'),
            section.id
        );
        debug!(%url, responses = responses.len(), "submitting session");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FinalizeError::SubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinalizeError::SubmissionFailed(format!(
                "submission endpoint returned {status}: {body}"
            )));
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));

        Ok(SubmissionReceipt {
            message,
            submitted_at: Utc::now(),
        })
    }
}

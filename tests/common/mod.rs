//! Shared integration-test harness: scripted capture devices, players, and
//! submission sinks for driving whole sessions under the paused tokio clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::broadcast;

use viva_session::capture::{CaptureDevice, CaptureStream};
use viva_session::config::schema::{
    SectionConfig, SectionId, StimulusRef, TaskConfig, TaskId, TaskKind,
};
use viva_session::error::{CaptureError, FinalizeError, PlaybackError};
use viva_session::phase::Phase;
use viva_session::session::SessionEvent;
use viva_session::stimulus::StimulusPlayer;
use viva_session::store::{ResponseArtifact, ResponseStore};
use viva_session::submit::{SubmissionReceipt, SubmissionSink};

/// Guard for waiting on the next session event. Must exceed every legitimate
/// inter-event gap (the longest phase timer or clip), so that under the
/// paused clock the session's own timers always fire first.
pub const EVENT_GUARD: Duration = Duration::from_secs(600);

// ============================================================================
// Capture device
// ============================================================================

/// One scripted capture attempt.
pub enum DeviceScript {
    /// Acquire succeeds; the stream yields these chunks, then idles until
    /// stopped.
    Chunks(Vec<&'static [u8]>),
    /// Acquire succeeds; the stream yields nothing.
    Silence,
    /// Acquire fails with a permission denial.
    Deny(&'static str),
}

/// Capture device handing out one scripted stream per acquisition.
pub struct ScriptedDevice {
    scripts: Mutex<VecDeque<DeviceScript>>,
    /// When `true`, an exhausted script queue falls back to a default chunk
    /// instead of denying access.
    endless: bool,
}

impl ScriptedDevice {
    /// Every acquisition succeeds and records a small default payload.
    pub fn always_recording() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            endless: true,
        })
    }

    /// Plays the given scripts in order; further acquisitions are denied,
    /// so a test fails loudly if the session records more often than
    /// expected.
    pub fn scripted(scripts: Vec<DeviceScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            endless: false,
        })
    }
}

struct ScriptedStream {
    chunks: VecDeque<Bytes>,
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let script = self.scripts.lock().unwrap().pop_front();
        let script = match script {
            Some(script) => script,
            None if self.endless => DeviceScript::Chunks(vec![b"response-audio"]),
            None => return Err(CaptureError::DeviceUnavailable("no script left".to_string())),
        };
        match script {
            DeviceScript::Chunks(chunks) => Ok(Box::new(ScriptedStream {
                chunks: chunks.into_iter().map(Bytes::from_static).collect(),
            })),
            DeviceScript::Silence => Ok(Box::new(ScriptedStream {
                chunks: VecDeque::new(),
            })),
            DeviceScript::Deny(message) => {
                Err(CaptureError::PermissionDenied(message.to_string()))
            }
        }
    }
}

#[async_trait]
impl CaptureStream for ScriptedStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, CaptureError> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None => std::future::pending().await,
        }
    }

    fn media_type(&self) -> &str {
        "audio/webm"
    }
}

// ============================================================================
// Stimulus player
// ============================================================================

/// Player that fails the first `failures` play-throughs, then plays normally.
pub struct FlakyPlayer {
    failures_left: AtomicU32,
    duration: Duration,
}

impl FlakyPlayer {
    pub fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            duration: Duration::from_secs(30),
        })
    }
}

#[async_trait]
impl StimulusPlayer for FlakyPlayer {
    async fn play(&self, _stimulus: &StimulusRef) -> Result<(), PlaybackError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(PlaybackError::Failed("decoder stall".to_string()));
        }
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

// ============================================================================
// Submission sink
// ============================================================================

/// One accepted submission as the sink saw it.
#[derive(Debug, Clone)]
pub struct SubmittedSession {
    pub section: SectionId,
    pub responses: Vec<(TaskId, usize)>,
}

/// Sink that records accepted submissions and can fail the first N attempts.
pub struct RecordingSink {
    attempts: AtomicU32,
    fail_first: u32,
    sessions: Mutex<Vec<SubmittedSession>>,
}

impl RecordingSink {
    pub fn accepting() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicU32::new(0),
            fail_first: failures,
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SubmittedSession> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    async fn submit(
        &self,
        section: &SectionConfig,
        responses: &ResponseStore,
    ) -> Result<SubmissionReceipt, FinalizeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(FinalizeError::SubmissionFailed(
                "backend unavailable".to_string(),
            ));
        }
        self.sessions.lock().unwrap().push(SubmittedSession {
            section: section.id,
            responses: responses
                .iter()
                .map(|(task, artifact)| (task, artifact.len()))
                .collect(),
        });
        Ok(SubmissionReceipt {
            message: Some("Responses submitted successfully".to_string()),
            submitted_at: Utc::now(),
        })
    }
}

// ============================================================================
// Section fixtures
// ============================================================================

pub fn task(id: u32, ordinal: u32, kind: TaskKind) -> TaskConfig {
    TaskConfig {
        id: TaskId(id),
        ordinal,
        kind,
        passage: kind
            .declares_passage()
            .then(|| format!("Reading passage for task {ordinal}.")),
        audio: kind
            .declares_audio()
            .then(|| StimulusRef(format!("clips/task{ordinal}.webm"))),
        prompt: format!("Prompt for task {ordinal}."),
        preparation_secs: None,
        response_secs: None,
    }
}

pub fn section(id: u32, tasks: Vec<TaskConfig>) -> SectionConfig {
    SectionConfig {
        id: SectionId(id),
        title: "Integration section".to_string(),
        tasks,
    }
}

/// One independent task (scenario A shape).
pub fn independent_section() -> SectionConfig {
    section(1, vec![task(10, 1, TaskKind::Independent)])
}

/// The original four-task sitting: independent, two reading+listening, one
/// listening-only.
pub fn full_section() -> SectionConfig {
    section(
        2,
        vec![
            task(20, 1, TaskKind::Independent),
            task(21, 2, TaskKind::ReadingListening),
            task(22, 3, TaskKind::ReadingListening),
            task(23, 4, TaskKind::ListeningOnly),
        ],
    )
}

// ============================================================================
// Event helpers
// ============================================================================

/// Receives the next session event, panicking after [`EVENT_GUARD`].
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_GUARD, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Asserts that no event arrives within `window`.
pub async fn assert_no_event(rx: &mut broadcast::Receiver<SessionEvent>, window: Duration) {
    let result = tokio::time::timeout(window, rx.recv()).await;
    assert!(result.is_err(), "expected silence, got {:?}", result.unwrap());
}

/// Receives the next event and asserts it is `PhaseChanged` into `expected`.
pub async fn expect_phase(rx: &mut broadcast::Receiver<SessionEvent>, expected: Phase) {
    match next_event(rx).await {
        SessionEvent::PhaseChanged { phase, .. } if phase == expected => {}
        other => panic!("expected phase {expected}, got {other:?}"),
    }
}

/// Collects `PhaseChanged` phases until the task completes; returns the
/// phases visited and the completed task's artifact. Panics on any other
/// event.
pub async fn phases_until_task_completed(
    rx: &mut broadcast::Receiver<SessionEvent>,
) -> (Vec<Phase>, ResponseArtifact) {
    let mut phases = Vec::new();
    loop {
        match next_event(rx).await {
            SessionEvent::PhaseChanged { phase, .. } => phases.push(phase),
            SessionEvent::TaskCompleted { artifact, .. } => return (phases, artifact),
            other => panic!("unexpected event while driving task: {other:?}"),
        }
    }
}

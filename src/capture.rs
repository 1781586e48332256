//! Response capture lifecycle.
//!
//! [`ResponseCapture`] owns the exclusive microphone resource through the
//! [`CaptureDevice`] seam: Idle → Requesting → Recording →
//! (Stopped-with-data | Stopped-empty | Errored). Chunks accumulate into a
//! single artifact; a zero-byte result is reported as empty, never stored.
//! The device is released deterministically when the capture stream drops,
//! including while the permission grant is still pending.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::schema::TaskId;
use crate::error::CaptureError;
use crate::store::ResponseArtifact;

/// Lifecycle state of the capture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No capture underway
    Idle,
    /// Waiting on the device permission grant
    Requesting,
    /// Device acquired, accumulating chunks
    Recording,
    /// Finalized with a non-empty artifact
    StoppedWithData,
    /// Finalized with zero bytes accumulated
    StoppedEmpty,
    /// Device denied or failed
    Errored,
}

/// Exclusive audio capture device.
///
/// At most one acquisition is live at a time; dropping the returned stream
/// releases the device.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Requests exclusive access to the device.
    ///
    /// May suspend for as long as the runtime's permission grant takes; the
    /// caller stays responsive and may abandon the request.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when access is denied or no device exists.
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A live capture stream handed out by [`CaptureDevice::acquire`].
#[async_trait]
pub trait CaptureStream: Send {
    /// Next chunk of encoded audio. `Ok(None)` means the device closed the
    /// stream on its own.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the device fails mid-recording.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, CaptureError>;

    /// Media type of the encoded chunks, e.g. `audio/webm`.
    fn media_type(&self) -> &str;
}

/// How one capture attempt ended without producing an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    /// Stopped with zero bytes accumulated
    Empty,
    /// The runtime refused device access
    PermissionDenied(String),
    /// The device failed before or during recording
    Device(String),
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("recording captured no audio data"),
            Self::PermissionDenied(msg) => write!(f, "microphone access denied: {msg}"),
            Self::Device(msg) => write!(f, "capture device failed: {msg}"),
        }
    }
}

/// Outcome of one capture attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// A non-empty artifact was produced
    Stored(ResponseArtifact),
    /// The attempt ended without a usable artifact
    Failed(CaptureFailure),
}

/// Report delivered to the session loop when a capture attempt ends.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// The task the recording belongs to
    pub task: TaskId,
    /// How the attempt ended
    pub outcome: CaptureOutcome,
}

/// Drives the capture device for one session.
pub struct ResponseCapture {
    device: Arc<dyn CaptureDevice>,
    state: Arc<Mutex<CaptureState>>,
    stop: Option<CancellationToken>,
}

impl ResponseCapture {
    /// Creates a capture controller over the given device.
    #[must_use]
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            stop: None,
        }
    }

    /// Current lifecycle state.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock is poisoned.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        *self.state.lock().expect("capture state lock poisoned")
    }

    /// Whether an attempt is underway (requesting or recording).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state(), CaptureState::Requesting | CaptureState::Recording)
    }

    /// Begins a capture attempt for `task`, reporting the outcome on `tx`.
    ///
    /// A no-op while an attempt is already underway — guards against
    /// double-start from repeated user actions.
    pub fn start(&mut self, task: TaskId, tx: mpsc::UnboundedSender<CaptureReport>) {
        if self.is_active() {
            warn!(%task, "capture already active; ignoring start");
            return;
        }
        set_state(&self.state, CaptureState::Requesting);

        let stop = CancellationToken::new();
        tokio::spawn(run_capture(
            Arc::clone(&self.device),
            Arc::clone(&self.state),
            stop.clone(),
            task,
            tx,
        ));
        self.stop = Some(stop);
    }

    /// Finalizes the current attempt.
    ///
    /// A no-op when no attempt is underway. Stopping while the permission
    /// grant is still pending abandons the request and reports an empty
    /// outcome.
    pub fn stop(&mut self) {
        if !self.is_active() {
            debug!("capture stop with no active attempt; no-op");
            return;
        }
        if let Some(stop) = self.stop.take() {
            stop.cancel();
        }
    }
}

impl std::fmt::Debug for ResponseCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCapture")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn set_state(state: &Mutex<CaptureState>, next: CaptureState) {
    *state.lock().expect("capture state lock poisoned") = next;
}

async fn run_capture(
    device: Arc<dyn CaptureDevice>,
    state: Arc<Mutex<CaptureState>>,
    stop: CancellationToken,
    task: TaskId,
    tx: mpsc::UnboundedSender<CaptureReport>,
) {
    let mut stream = tokio::select! {
        () = stop.cancelled() => {
            // Abandoned before the grant resolved: nothing was recorded.
            set_state(&state, CaptureState::StoppedEmpty);
            let _ = tx.send(CaptureReport {
                task,
                outcome: CaptureOutcome::Failed(CaptureFailure::Empty),
            });
            return;
        }
        acquired = device.acquire() => match acquired {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%task, %err, "capture device acquisition failed");
                set_state(&state, CaptureState::Errored);
                let failure = match err {
                    CaptureError::PermissionDenied(msg) => CaptureFailure::PermissionDenied(msg),
                    other => CaptureFailure::Device(other.to_string()),
                };
                let _ = tx.send(CaptureReport {
                    task,
                    outcome: CaptureOutcome::Failed(failure),
                });
                return;
            }
        }
    };

    set_state(&state, CaptureState::Recording);
    debug!(%task, "capture device acquired; recording");

    let media_type = stream.media_type().to_string();
    let mut chunks: Vec<Bytes> = Vec::new();

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            chunk = stream.next_chunk() => match chunk {
                Ok(Some(chunk)) => {
                    if !chunk.is_empty() {
                        chunks.push(chunk);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%task, %err, "capture device failed mid-recording");
                    set_state(&state, CaptureState::Errored);
                    let _ = tx.send(CaptureReport {
                        task,
                        outcome: CaptureOutcome::Failed(CaptureFailure::Device(err.to_string())),
                    });
                    return;
                }
            }
        }
    }

    // Release the device before reporting.
    drop(stream);

    match ResponseArtifact::from_chunks(&chunks, media_type) {
        Some(artifact) => {
            debug!(%task, bytes = artifact.len(), "capture finalized");
            set_state(&state, CaptureState::StoppedWithData);
            let _ = tx.send(CaptureReport {
                task,
                outcome: CaptureOutcome::Stored(artifact),
            });
        }
        None => {
            warn!(%task, "capture finalized with zero bytes");
            set_state(&state, CaptureState::StoppedEmpty);
            let _ = tx.send(CaptureReport {
                task,
                outcome: CaptureOutcome::Failed(CaptureFailure::Empty),
            });
        }
    }
}

//! Task session orchestrator.
//!
//! One cooperative event loop owns the whole session: it consumes timer
//! expiries, playback reports, capture reports, and user actions, and is the
//! only writer of session state and the response store. Rendering subscribes
//! to the outbound event channel; it never drives transitions.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{CaptureDevice, CaptureOutcome, CaptureReport, ResponseCapture};
use crate::config::schema::{SectionConfig, TaskId};
use crate::config::timing::TimingTable;
use crate::config::validation;
use crate::error::{PlaybackError, Result, SessionError};
use crate::observability::metrics;
use crate::phase::{self, Phase, PhaseMachine, TransitionReason};
use crate::session::events::{FinalizeOutcome, SessionEvent, UserAction};
use crate::stimulus::StimulusPlayer;
use crate::store::ResponseStore;
use crate::submit::{SubmissionReceipt, SubmissionSink};
use crate::timer::{Countdown, TimerFired};

/// Broadcast buffer for outbound session events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How many automatic capture attempts a task gets before the session stops
/// re-arming the preparation countdown and waits for an explicit
/// [`UserAction::BeginCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureRetryPolicy {
    /// Retry without limit (the historical behavior)
    #[default]
    Unlimited,
    /// At most this many automatic attempts per task
    Limited(u32),
}

impl CaptureRetryPolicy {
    const fn exhausted(self, attempts: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited(max) => attempts >= max,
        }
    }
}

/// How a finished session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The sink acknowledged the submission
    Submitted(SubmissionReceipt),
    /// The session was torn down without submitting
    Abandoned,
}

/// Cloneable handle for the embedding layer: actions in, events out.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    actions: mpsc::UnboundedSender<UserAction>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Sends an action into the session loop.
    ///
    /// Returns `false` once the session has ended.
    pub fn act(&self, action: UserAction) -> bool {
        self.actions.send(action).is_ok()
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Subscribes to session events as a `Stream`.
    #[must_use]
    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.subscribe())
    }
}

/// Builds a [`SessionOrchestrator`] with its collaborators.
pub struct SessionBuilder {
    section: SectionConfig,
    player: Arc<dyn StimulusPlayer>,
    device: Arc<dyn CaptureDevice>,
    sink: Arc<dyn SubmissionSink>,
    timing: TimingTable,
    retry_policy: CaptureRetryPolicy,
}

impl SessionBuilder {
    /// Starts a builder over the section and its external collaborators.
    #[must_use]
    pub fn new(
        section: SectionConfig,
        player: Arc<dyn StimulusPlayer>,
        device: Arc<dyn CaptureDevice>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        Self {
            section,
            player,
            device,
            sink,
            timing: TimingTable::default(),
            retry_policy: CaptureRetryPolicy::default(),
        }
    }

    /// Replaces the default timing table.
    #[must_use]
    pub fn timing(mut self, timing: TimingTable) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the capture retry policy.
    #[must_use]
    pub fn capture_retries(mut self, policy: CaptureRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Validates the section and assembles the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when validation finds error-severity
    /// issues. Warnings are logged and the session proceeds.
    pub fn build(self) -> Result<(SessionOrchestrator, SessionHandle)> {
        let mut section = self.section;
        let issues = validation::ensure_valid(&section).map_err(SessionError::Config)?;
        for issue in &issues {
            warn!(%issue, "section configuration defect");
        }
        section.tasks.sort_by_key(|t| t.ordinal);

        metrics::describe();

        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (stimulus_tx, stimulus_rx) = mpsc::unbounded_channel();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let machine = PhaseMachine::new(phase::resolve(&section.tasks[0]));

        let handle = SessionHandle {
            actions: action_tx,
            events: event_tx.clone(),
        };

        let orchestrator = SessionOrchestrator {
            session_id: Uuid::new_v4(),
            section,
            timing: self.timing,
            retry_policy: self.retry_policy,
            player: self.player,
            capture: ResponseCapture::new(self.device),
            sink: self.sink,
            store: ResponseStore::new(),
            machine,
            task_index: 0,
            timer: Countdown::new(),
            timer_epoch: 0,
            playback_pending: false,
            manual_capture_required: false,
            submitted: false,
            timer_tx,
            timer_rx,
            capture_tx,
            capture_rx,
            stimulus_tx,
            stimulus_rx,
            action_rx,
            events: event_tx,
        };

        Ok((orchestrator, handle))
    }
}

struct StimulusReport {
    task: TaskId,
    result: std::result::Result<(), PlaybackError>,
}

/// Drives a section's tasks from first phase to submission.
pub struct SessionOrchestrator {
    session_id: Uuid,
    section: SectionConfig,
    timing: TimingTable,
    retry_policy: CaptureRetryPolicy,
    player: Arc<dyn StimulusPlayer>,
    capture: ResponseCapture,
    sink: Arc<dyn SubmissionSink>,
    store: ResponseStore,
    machine: PhaseMachine,
    task_index: usize,
    timer: Countdown,
    timer_epoch: u64,
    playback_pending: bool,
    manual_capture_required: bool,
    submitted: bool,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    capture_tx: mpsc::UnboundedSender<CaptureReport>,
    capture_rx: mpsc::UnboundedReceiver<CaptureReport>,
    stimulus_tx: mpsc::UnboundedSender<StimulusReport>,
    stimulus_rx: mpsc::UnboundedReceiver<StimulusReport>,
    action_rx: mpsc::UnboundedReceiver<UserAction>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionOrchestrator {
    /// Runs the session to completion.
    ///
    /// Returns when the session is submitted, the handle asks for teardown,
    /// or every [`SessionHandle`] has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only for broken invariants (e.g. a write to a frozen
    /// store); recoverable capture and playback failures are handled inside
    /// the loop.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        info!(
            session = %self.session_id,
            section = %self.section.id,
            tasks = self.section.tasks.len(),
            "session started"
        );
        self.enter_phase();

        loop {
            tokio::select! {
                Some(fired) = self.timer_rx.recv() => self.on_timer(fired),
                Some(report) = self.capture_rx.recv() => self.on_capture(report)?,
                Some(report) = self.stimulus_rx.recv() => self.on_stimulus(report),
                action = self.action_rx.recv() => match action {
                    Some(action) => {
                        debug!(?action, "user action");
                        if let Some(outcome) = self.on_action(action).await? {
                            return Ok(outcome);
                        }
                    }
                    None => {
                        info!("all session handles dropped; tearing down");
                        self.teardown();
                        return Ok(SessionOutcome::Abandoned);
                    }
                },
            }
        }
    }

    fn current_task_id(&self) -> TaskId {
        self.section.tasks[self.task_index].id
    }

    /// Performs the entry side effects of the machine's current phase.
    fn enter_phase(&mut self) {
        let phase = self.machine.current();
        let task_id = self.current_task_id();
        metrics::record_phase_entered(phase);
        let _ = self.events.send(SessionEvent::PhaseChanged { task: task_id, phase });

        match phase {
            Phase::Orientation | Phase::QuestionPreview | Phase::Reading | Phase::QuestionReveal => {
                let duration = self
                    .timing
                    .phase_duration(&self.section.tasks[self.task_index], phase)
                    .expect("fixed phases always have a duration");
                self.timer_epoch = self.timer.start(duration, self.timer_tx.clone());
            }
            Phase::Listening => {
                self.timer.cancel();
                self.spawn_playback();
            }
            Phase::Preparation => {
                if self.manual_capture_required {
                    // Retry budget spent: hold in Preparation until an
                    // explicit begin-capture action arrives.
                    self.timer.cancel();
                } else {
                    let duration = self
                        .timing
                        .phase_duration(&self.section.tasks[self.task_index], phase)
                        .expect("preparation always has a duration");
                    self.timer_epoch = self.timer.start(duration, self.timer_tx.clone());
                }
            }
            Phase::Capturing => {
                let attempt = self.machine.begin_capture_attempt();
                debug!(%task_id, attempt, "starting response capture");
                metrics::record_capture_attempt();
                self.capture.start(task_id, self.capture_tx.clone());
                let duration = self
                    .timing
                    .phase_duration(&self.section.tasks[self.task_index], phase)
                    .expect("capturing always has a duration");
                self.timer_epoch = self.timer.start(duration, self.timer_tx.clone());
            }
            Phase::Completed => {
                self.timer.cancel();
                let artifact = self
                    .store
                    .get(task_id)
                    .cloned()
                    .expect("completed task always has a stored response");
                let _ = self.events.send(SessionEvent::TaskCompleted { task: task_id, artifact });
            }
        }
    }

    /// Starts the current task's audio stimulus in the background.
    fn spawn_playback(&mut self) {
        let Some(stimulus) = self.section.tasks[self.task_index].audio.clone() else {
            // The resolver elides Listening for audio-less tasks; reaching
            // here means sequence and config disagree. Skip forward, the
            // session stays usable.
            let task_id = self.current_task_id();
            warn!(%task_id, "listening phase with no audio stimulus; skipping");
            if self.machine.advance(TransitionReason::ConfigDefect).is_some() {
                self.enter_phase();
            }
            return;
        };

        let task_id = self.current_task_id();
        let player = Arc::clone(&self.player);
        let tx = self.stimulus_tx.clone();
        self.playback_pending = true;
        debug!(%task_id, %stimulus, "stimulus playback started");
        tokio::spawn(async move {
            let result = player.play(&stimulus).await;
            let _ = tx.send(StimulusReport { task: task_id, result });
        });
    }

    fn on_timer(&mut self, fired: TimerFired) {
        if fired.epoch != self.timer_epoch {
            debug!(epoch = fired.epoch, "stale timer notice; ignoring");
            return;
        }
        match self.machine.current() {
            Phase::Orientation
            | Phase::QuestionPreview
            | Phase::Reading
            | Phase::QuestionReveal
            | Phase::Preparation => {
                // Preparation expiry flows straight into Capturing, whose
                // entry starts the recording in the same tick.
                if self.machine.advance(TransitionReason::TimerExpired).is_some() {
                    self.enter_phase();
                }
            }
            Phase::Capturing => {
                info!("response window elapsed; stopping capture");
                self.capture.stop();
            }
            Phase::Listening | Phase::Completed => {
                debug!("timer notice in event-driven phase; ignoring");
            }
        }
    }

    fn on_stimulus(&mut self, report: StimulusReport) {
        let task_id = self.current_task_id();
        if report.task != task_id {
            debug!(task = %report.task, "playback report for an abandoned task; discarded");
            return;
        }
        self.playback_pending = false;

        match report.result {
            Ok(()) => {
                if self.machine.current() == Phase::Listening {
                    self.machine.mark_stimulus_played();
                    if self.machine.advance(TransitionReason::StimulusFinished).is_some() {
                        self.enter_phase();
                    }
                } else {
                    debug!(%task_id, "review replay finished");
                }
            }
            Err(err) => {
                warn!(%task_id, %err, "stimulus playback failed; phase re-offered");
                metrics::record_stimulus_failure();
                let _ = self.events.send(SessionEvent::StimulusFailed {
                    task: task_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    fn on_capture(&mut self, report: CaptureReport) -> Result<()> {
        let task_id = self.current_task_id();
        if report.task != task_id || self.machine.current() != Phase::Capturing {
            // Abandoned mid-capture: the partial recording is never stored.
            debug!(task = %report.task, "capture report for an abandoned attempt; discarded");
            return Ok(());
        }
        self.timer.cancel();

        match report.outcome {
            CaptureOutcome::Stored(artifact) => {
                self.store.insert(task_id, artifact)?;
                self.machine.advance(TransitionReason::CaptureStored);
                self.enter_phase();
            }
            CaptureOutcome::Failed(failure) => {
                let attempts = self.machine.capture_attempts();
                warn!(%task_id, attempts, %failure, "capture rejected; returning to preparation");
                metrics::record_capture_rejection(&failure);
                let _ = self.events.send(SessionEvent::CaptureRejected {
                    task: task_id,
                    failure,
                    attempt: attempts,
                });
                if self.retry_policy.exhausted(attempts) {
                    info!(%task_id, attempts, "capture retry budget spent; awaiting explicit begin");
                    self.manual_capture_required = true;
                    let _ = self.events.send(SessionEvent::CaptureRetriesExhausted {
                        task: task_id,
                        attempts,
                    });
                }
                self.machine.return_to_preparation(TransitionReason::CaptureRejected);
                self.enter_phase();
            }
        }
        Ok(())
    }

    async fn on_action(&mut self, action: UserAction) -> Result<Option<SessionOutcome>> {
        match action {
            UserAction::Advance => {
                if self.machine.is_complete() {
                    return self.advance_to_next_task().await;
                }
                match self.machine.try_manual_advance() {
                    Ok(_) => self.enter_phase(),
                    Err(blocked) => warn!(%blocked, "manual advance refused"),
                }
                Ok(None)
            }
            UserAction::BeginCapture => {
                if self.machine.current() == Phase::Preparation {
                    self.manual_capture_required = false;
                    self.machine.advance(TransitionReason::ManualAdvance);
                    self.enter_phase();
                } else {
                    warn!("begin-capture outside preparation; ignoring");
                }
                Ok(None)
            }
            UserAction::StopCapture => {
                if self.machine.current() == Phase::Capturing {
                    self.capture.stop();
                } else {
                    debug!("stop-capture outside capturing; no-op");
                }
                Ok(None)
            }
            UserAction::ReplayStimulus => {
                self.replay_stimulus();
                Ok(None)
            }
            UserAction::JumpToTask(index) => {
                if index < self.section.tasks.len() {
                    self.load_task(index);
                } else {
                    warn!(index, "jump to out-of-range task; ignoring");
                }
                Ok(None)
            }
            UserAction::Finalize => self.finalize().await,
            UserAction::EndSession => {
                self.teardown();
                Ok(Some(SessionOutcome::Abandoned))
            }
        }
    }

    fn replay_stimulus(&mut self) {
        if self.playback_pending {
            debug!("playback already in flight; replay ignored");
            return;
        }
        let has_audio = self.section.tasks[self.task_index].audio.is_some();
        match self.machine.current() {
            // Retry after a failed play-through
            Phase::Listening if !self.machine.stimulus_played() => self.spawn_playback(),
            // The primary play-through is consumed; the plays-once rule holds
            Phase::Listening => warn!("stimulus already consumed; replay refused"),
            // Review replay while preparing
            Phase::Preparation if has_audio => self.spawn_playback(),
            phase => warn!(%phase, "no stimulus to replay in this phase"),
        }
    }

    /// Switches to the task at `index`, discarding any in-flight work for the
    /// task being left.
    fn load_task(&mut self, index: usize) {
        self.timer.cancel();
        if self.capture.is_active() {
            debug!("abandoning task mid-capture; partial recording discarded");
            self.capture.stop();
        }
        self.playback_pending = false;
        self.manual_capture_required = false;
        self.task_index = index;

        let task = &self.section.tasks[index];
        info!(task = %task.id, ordinal = task.ordinal, kind = %task.kind, "task loaded");
        self.machine = PhaseMachine::new(phase::resolve(task));
        self.enter_phase();
    }

    async fn advance_to_next_task(&mut self) -> Result<Option<SessionOutcome>> {
        if self.task_index + 1 < self.section.tasks.len() {
            self.load_task(self.task_index + 1);
            Ok(None)
        } else {
            self.finalize().await
        }
    }

    /// Checks completeness and hands the store to the submission sink.
    async fn finalize(&mut self) -> Result<Option<SessionOutcome>> {
        if self.submitted {
            warn!("finalize after successful submission; ignoring");
            return Ok(None);
        }

        let expected = self.section.task_ids();
        let missing = self.store.missing_from(&expected);
        if !missing.is_empty() {
            warn!(missing = missing.len(), "finalize blocked; session incomplete");
            let _ = self.events.send(SessionEvent::SessionFinalized {
                outcome: FinalizeOutcome::MissingResponses { tasks: missing.clone() },
            });
            // Route the user back to the first incomplete task.
            if let Some(index) = self.section.index_of(missing[0]) {
                self.load_task(index);
            }
            return Ok(None);
        }

        self.store.freeze();
        match self.sink.submit(&self.section, &self.store).await {
            Ok(receipt) => {
                info!(session = %self.session_id, "session submitted");
                metrics::record_session_finalized(true);
                let _ = self.events.send(SessionEvent::SessionFinalized {
                    outcome: FinalizeOutcome::Submitted { receipt: receipt.clone() },
                });
                self.submitted = true;
                self.teardown();
                Ok(Some(SessionOutcome::Submitted(receipt)))
            }
            Err(err) => {
                warn!(%err, "submission failed; store retained for retry");
                metrics::record_session_finalized(false);
                let _ = self.events.send(SessionEvent::SessionFinalized {
                    outcome: FinalizeOutcome::SubmissionFailed { reason: err.to_string() },
                });
                Ok(None)
            }
        }
    }

    /// Cancels the timer and releases the capture device.
    fn teardown(&mut self) {
        self.timer.cancel();
        if self.capture.is_active() {
            self.capture.stop();
        }
        info!(session = %self.session_id, "session torn down");
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("session_id", &self.session_id)
            .field("task_index", &self.task_index)
            .field("phase", &self.machine.current())
            .field("responses", &self.store.len())
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

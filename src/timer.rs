//! Cancellable single-shot countdown.
//!
//! One countdown drives every fixed-duration phase. Each `start` replaces any
//! pending schedule and returns a fresh epoch; the expiry notice carries that
//! epoch so the session loop can drop notices from superseded schedules. A
//! cancelled countdown never fires. Pause and resume are wall-clock
//! approximate; no drift correction is attempted.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Expiry notice delivered to the session loop.
///
/// Consumers must ignore notices whose epoch does not match the most recent
/// [`Countdown::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Epoch of the schedule that fired
    pub epoch: u64,
}

struct ActiveCountdown {
    cancel: CancellationToken,
    running: watch::Sender<bool>,
}

impl Drop for ActiveCountdown {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A cancellable, pausable single-shot countdown.
///
/// At most one schedule is pending at a time; restarting cancels the prior
/// schedule first. Exactly one [`TimerFired`] is sent per start, never after
/// cancellation.
pub struct Countdown {
    epoch: u64,
    active: Option<ActiveCountdown>,
}

impl Countdown {
    /// Creates an idle countdown.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epoch: 0,
            active: None,
        }
    }

    /// The epoch of the most recent start.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a schedule is pending and not paused.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| *a.running.borrow())
    }

    /// Schedules a single expiry notice after `duration`.
    ///
    /// Any prior schedule is cancelled first. Returns the new schedule's
    /// epoch.
    pub fn start(&mut self, duration: Duration, tx: mpsc::UnboundedSender<TimerFired>) -> u64 {
        self.cancel();
        self.epoch += 1;
        let epoch = self.epoch;

        let cancel = CancellationToken::new();
        let (running_tx, running_rx) = watch::channel(true);
        tokio::spawn(run_countdown(duration, epoch, tx, cancel.clone(), running_rx));

        debug!(epoch, ?duration, "countdown started");
        self.active = Some(ActiveCountdown {
            cancel,
            running: running_tx,
        });
        epoch
    }

    /// Cancels the pending schedule, if any. Idempotent.
    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            debug!(epoch = self.epoch, "countdown cancelled");
        }
    }

    /// Suspends the pending schedule, preserving the remaining time.
    pub fn pause(&self) {
        if let Some(active) = &self.active {
            let _ = active.running.send(false);
        }
    }

    /// Resumes a paused schedule from its remaining time.
    pub fn resume(&self) {
        if let Some(active) = &self.active {
            let _ = active.running.send(true);
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Countdown")
            .field("epoch", &self.epoch)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_countdown(
    duration: Duration,
    epoch: u64,
    tx: mpsc::UnboundedSender<TimerFired>,
    cancel: CancellationToken,
    mut running: watch::Receiver<bool>,
) {
    let mut remaining = duration;
    let mut deadline = Instant::now() + remaining;

    loop {
        let paused = !*running.borrow();
        if paused {
            // Paused: hold the remaining time until resumed or cancelled.
            tokio::select! {
                () = cancel.cancelled() => return,
                changed = running.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *running.borrow() {
                        deadline = Instant::now() + remaining;
                    }
                }
            }
            continue;
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            changed = running.changed() => {
                if changed.is_err() {
                    return;
                }
                if !*running.borrow() {
                    remaining = deadline.saturating_duration_since(Instant::now());
                }
            }
            () = tokio::time::sleep_until(deadline) => {
                debug!(epoch, "countdown elapsed");
                let _ = tx.send(TimerFired { epoch });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        let epoch = countdown.start(Duration::from_secs(5), tx);

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap(), TimerFired { epoch });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn never_fires_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.start(Duration::from_secs(5), tx);
        countdown.cancel();

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.cancel();
        countdown.start(Duration::from_secs(1), tx);
        countdown.cancel();
        countdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_supersedes_prior_schedule() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        let first = countdown.start(Duration::from_secs(5), tx.clone());
        let second = countdown.start(Duration::from_secs(2), tx);
        assert_ne!(first, second);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.epoch, second);
        assert!(rx.try_recv().is_err(), "superseded schedule must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_remaining_time() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.start(Duration::from_secs(10), tx);

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        countdown.pause();
        settle().await;
        assert!(!countdown.is_running());

        // Time passing while paused must not fire the countdown
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        countdown.resume();
        settle().await;
        assert!(countdown.is_running());
        tokio::time::advance(Duration::from_secs(7)).await;
        settle().await;
        assert!(rx.try_recv().is_ok());
    }
}

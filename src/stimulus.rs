//! Stimulus playback seam.
//!
//! The session loop drives playback through [`StimulusPlayer`]; any runtime
//! with an audio playback primitive can implement it. Playback failures are
//! recoverable: the session re-offers the phase instead of aborting.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::schema::StimulusRef;
use crate::error::PlaybackError;

/// Plays one audio stimulus to completion.
#[async_trait]
pub trait StimulusPlayer: Send + Sync {
    /// Plays the stimulus, resolving when the final sample has been rendered.
    ///
    /// Resolves exactly once per play-through. Implementations must not
    /// resolve early: the session's "must finish listening" guard is keyed
    /// off this completion.
    ///
    /// # Errors
    ///
    /// Returns a [`PlaybackError`] when the stimulus cannot be resolved or
    /// playback aborts mid-clip.
    async fn play(&self, stimulus: &StimulusRef) -> Result<(), PlaybackError>;
}

/// Player for headless and simulated runs: each clip "plays" for a fixed
/// wall-clock duration, then completes.
#[derive(Debug, Clone)]
pub struct FixedDurationPlayer {
    default_duration: Duration,
    clips: HashMap<String, Duration>,
}

impl FixedDurationPlayer {
    /// Creates a player where unknown clips play for `default_duration`.
    #[must_use]
    pub fn new(default_duration: Duration) -> Self {
        Self {
            default_duration,
            clips: HashMap::new(),
        }
    }

    /// Registers a known clip length.
    #[must_use]
    pub fn with_clip(mut self, stimulus: impl Into<String>, duration: Duration) -> Self {
        self.clips.insert(stimulus.into(), duration);
        self
    }
}

#[async_trait]
impl StimulusPlayer for FixedDurationPlayer {
    async fn play(&self, stimulus: &StimulusRef) -> Result<(), PlaybackError> {
        let duration = self
            .clips
            .get(&stimulus.0)
            .copied()
            .unwrap_or(self.default_duration);
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

//! Audio sink implementations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::error::SpeechError;
use crate::{AudioClip, AudioSink};

/// Sink that "plays" a clip by waiting out its duration.
///
/// Used where no audio output device is available; playback-until-ended
/// semantics are preserved without touching hardware.
#[derive(Debug, Clone, Default)]
pub struct TimedAudioSink;

impl TimedAudioSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for TimedAudioSink {
    async fn play(&self, clip: &AudioClip) -> Result<(), SpeechError> {
        debug!(clip = %clip.id, duration_ms = clip.duration.as_millis() as u64, "Playing clip");
        tokio::time::sleep(clip.duration).await;
        Ok(())
    }
}

/// Instrumented sink for testing.
///
/// Records which clips started playing and how many ended naturally, so
/// tests can assert the at-most-one-playing invariant. Playback takes the
/// clip's duration unless overridden.
#[derive(Debug, Default)]
pub struct MockAudioSink {
    started: Mutex<Vec<Uuid>>,
    ended: AtomicUsize,
    duration_override: Mutex<Option<Duration>>,
    fail: AtomicBool,
}

impl MockAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Play every clip for a fixed duration instead of its own.
    pub fn set_duration_override(&self, duration: Option<Duration>) {
        *self
            .duration_override
            .lock()
            .expect("duration override poisoned") = duration;
    }

    /// Make every play attempt fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Ids of clips whose playback started, in order.
    pub fn started_clips(&self) -> Vec<Uuid> {
        self.started.lock().expect("started list poisoned").clone()
    }

    /// Number of playbacks that ran to completion.
    pub fn ended_count(&self) -> usize {
        self.ended.load(Ordering::Relaxed)
    }
}

impl AudioSink for MockAudioSink {
    async fn play(&self, clip: &AudioClip) -> Result<(), SpeechError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(SpeechError::Playback("sink failure injected".to_string()));
        }

        self.started
            .lock()
            .expect("started list poisoned")
            .push(clip.id);

        let duration = self
            .duration_override
            .lock()
            .expect("duration override poisoned")
            .unwrap_or(clip.duration);
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        self.ended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Palika speech crate - recognition, synthesis, playback, and the session
//! manager that keeps them mutually exclusive.
//!
//! Provides trait-based abstractions for the external speech provider, the
//! audio output sink, and the recognition input source, along with mock
//! implementations for testing without real credentials or hardware.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use palika_core::types::Language;

pub mod error;
pub mod manager;
pub mod playback;
pub mod provider;

pub use error::SpeechError;
pub use manager::{PlaybackOutcome, SpeechSessionManager};
pub use playback::{MockAudioSink, TimedAudioSink};
pub use provider::{AzureSpeechProvider, MockAudioCapture, NullAudioCapture, WavFileCapture};

// =============================================================================
// Audio types
// =============================================================================

/// One decoded, playable audio resource produced by synthesis.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Stable identifier, usable as a message's `audio_id`.
    pub id: Uuid,
    /// Language the clip was synthesized in.
    pub language: Language,
    /// Exact text the clip was synthesized from.
    pub text: String,
    /// Encoded audio bytes as returned by the provider.
    pub audio: Vec<u8>,
    /// Playback duration.
    pub duration: Duration,
}

/// Shared handle to a cached audio clip.
pub type AudioHandle = std::sync::Arc<AudioClip>;

/// Raw synthesis output before it is cached as a clip.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: Vec<u8>,
    pub duration: Duration,
}

// =============================================================================
// Traits
// =============================================================================

/// External speech service: text-to-speech and speech-to-text.
pub trait SpeechProvider: Send + Sync {
    /// Synthesize text into playable audio in the given language.
    fn synthesize(
        &self,
        text: &str,
        language: Language,
    ) -> impl Future<Output = Result<SynthesizedAudio, SpeechError>> + Send;

    /// Run one recognition session and return the recognized text.
    fn recognize(
        &self,
        language: Language,
    ) -> impl Future<Output = Result<String, SpeechError>> + Send;
}

/// Output device abstraction. `play` resolves when playback ends naturally.
pub trait AudioSink: Send + Sync {
    fn play(&self, clip: &AudioClip) -> impl Future<Output = Result<(), SpeechError>> + Send;
}

/// Recognition input source supplying encoded audio to the provider.
pub trait AudioCapture: Send + Sync {
    fn record(&self) -> impl Future<Output = Result<Vec<u8>, SpeechError>> + Send;
}

// =============================================================================
// Mock provider
// =============================================================================

/// Mock speech provider for testing and development without credentials.
///
/// Synthesis returns deterministic bytes derived from the input; recognition
/// pops queued results. Call counters allow cache-behavior assertions.
#[derive(Debug, Default)]
pub struct MockSpeechProvider {
    synthesize_calls: AtomicUsize,
    recognize_calls: AtomicUsize,
    recognition_results: Mutex<VecDeque<Result<String, SpeechError>>>,
    recognition_delay: Mutex<Duration>,
    clip_duration: Mutex<Duration>,
    fail_synthesis: AtomicBool,
    unavailable: AtomicBool,
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next recognition session.
    pub fn push_recognition(&self, result: Result<String, SpeechError>) {
        self.recognition_results
            .lock()
            .expect("recognition queue poisoned")
            .push_back(result);
    }

    /// Delay recognition resolution, for cancellation tests.
    pub fn set_recognition_delay(&self, delay: Duration) {
        *self
            .recognition_delay
            .lock()
            .expect("recognition delay poisoned") = delay;
    }

    /// Duration reported for every synthesized clip.
    pub fn set_clip_duration(&self, duration: Duration) {
        *self.clip_duration.lock().expect("clip duration poisoned") = duration;
    }

    /// Make synthesis fail with a provider error.
    pub fn set_fail_synthesis(&self, fail: bool) {
        self.fail_synthesis.store(fail, Ordering::Relaxed);
    }

    /// Make synthesis fail as if credentials were absent.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn synthesize_count(&self) -> usize {
        self.synthesize_calls.load(Ordering::Relaxed)
    }

    pub fn recognize_count(&self) -> usize {
        self.recognize_calls.load(Ordering::Relaxed)
    }
}

impl SpeechProvider for MockSpeechProvider {
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
    ) -> Result<SynthesizedAudio, SpeechError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SpeechError::SynthesisUnavailable);
        }
        if self.fail_synthesis.load(Ordering::Relaxed) {
            return Err(SpeechError::Provider("synthesis failure injected".to_string()));
        }

        self.synthesize_calls.fetch_add(1, Ordering::Relaxed);
        let duration = *self.clip_duration.lock().expect("clip duration poisoned");
        Ok(SynthesizedAudio {
            audio: format!("audio:{}:{}", language.code(), text).into_bytes(),
            duration,
        })
    }

    async fn recognize(&self, _language: Language) -> Result<String, SpeechError> {
        self.recognize_calls.fetch_add(1, Ordering::Relaxed);

        let delay = *self
            .recognition_delay
            .lock()
            .expect("recognition delay poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.recognition_results
            .lock()
            .expect("recognition queue poisoned")
            .pop_front()
            .unwrap_or(Err(SpeechError::NoSpeechDetected))
    }
}

// =============================================================================
// Tests
// =============================================================================

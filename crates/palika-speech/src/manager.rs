//! Speech session manager: mutually-exclusive access to the recognizer,
//! synthesizer, and audio player.
//!
//! The manager guarantees at most one active playback and at most one open
//! recognition session. It does not serialize playback against recognition;
//! callers stop audio before recording and vice versa. Synthesized audio is
//! cached by `(language, exact text)` for the life of the process, with no
//! eviction beyond `clear_cache`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use palika_core::types::Language;

use crate::error::SpeechError;
use crate::{AudioClip, AudioHandle, AudioSink, SpeechProvider};

/// How a playback request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Playback ran to its natural end.
    Completed,
    /// Playback was stopped before it finished.
    Stopped,
    /// The clip was prepared but `autoplay` was false; nothing played.
    Skipped,
}

/// Stop signal for one playback or recognition session.
struct SessionControl {
    stop: Notify,
}

impl SessionControl {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            stop: Notify::new(),
        })
    }
}

/// Coordinator for the three speech resources.
pub struct SpeechSessionManager<P, S> {
    provider: P,
    sink: S,
    cache: Mutex<HashMap<(Language, String), AudioHandle>>,
    playing: Mutex<Option<Arc<SessionControl>>>,
    recognizing: Mutex<Option<Arc<SessionControl>>>,
}

impl<P: SpeechProvider, S: AudioSink> SpeechSessionManager<P, S> {
    pub fn new(provider: P, sink: S) -> Self {
        Self {
            provider,
            sink,
            cache: Mutex::new(HashMap::new()),
            playing: Mutex::new(None),
            recognizing: Mutex::new(None),
        }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Synthesize text, returning the cached handle when `(language, text)`
    /// was synthesized before. The provider is not invoked on a cache hit.
    pub async fn synthesize_to_audio(
        &self,
        text: &str,
        language: Language,
    ) -> Result<AudioHandle, SpeechError> {
        let key = (language, text.to_string());
        if let Some(handle) = self.cache.lock().expect("audio cache poisoned").get(&key) {
            debug!(language = %language, "Audio cache hit");
            return Ok(handle.clone());
        }

        let synthesized = self.provider.synthesize(text, language).await?;
        let handle: AudioHandle = Arc::new(AudioClip {
            id: Uuid::new_v4(),
            language,
            text: text.to_string(),
            audio: synthesized.audio,
            duration: synthesized.duration,
        });

        // A concurrent synthesis of the same key may have landed first;
        // whichever handle is in the cache wins.
        let mut cache = self.cache.lock().expect("audio cache poisoned");
        Ok(cache.entry(key).or_insert(handle).clone())
    }

    /// Play a clip, stopping any current playback first.
    ///
    /// Resolves when playback ends naturally (`Completed`) or is stopped by
    /// a later `stop_current_audio` / `play_audio` call (`Stopped`). With
    /// `autoplay` false nothing is played and `Skipped` is returned.
    pub async fn play_audio(
        &self,
        handle: &AudioHandle,
        autoplay: bool,
    ) -> Result<PlaybackOutcome, SpeechError> {
        self.stop_current_audio();

        if !autoplay {
            return Ok(PlaybackOutcome::Skipped);
        }

        let control = SessionControl::new();
        *self.playing.lock().expect("playback slot poisoned") = Some(control.clone());

        let outcome = tokio::select! {
            result = self.sink.play(handle) => result.map(|_| PlaybackOutcome::Completed),
            _ = control.stop.notified() => Ok(PlaybackOutcome::Stopped),
        };

        let mut playing = self.playing.lock().expect("playback slot poisoned");
        if playing
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &control))
        {
            *playing = None;
        }

        outcome
    }

    /// Halt any playing audio. Idempotent; a no-op when nothing plays.
    pub fn stop_current_audio(&self) {
        if let Some(control) = self
            .playing
            .lock()
            .expect("playback slot poisoned")
            .take()
        {
            control.stop.notify_one();
        }
    }

    /// Whether audio is currently playing.
    pub fn is_playing(&self) -> bool {
        self.playing.lock().expect("playback slot poisoned").is_some()
    }

    /// Run one recognition session against the provider.
    ///
    /// Any recognition still open is cancelled first. A session stopped via
    /// `stop_recognizing` resolves with `SpeechError::Cancelled`, which
    /// callers treat as "nothing was said".
    pub async fn recognize_speech(&self, language: Language) -> Result<String, SpeechError> {
        self.stop_recognizing();

        let control = SessionControl::new();
        *self
            .recognizing
            .lock()
            .expect("recognition slot poisoned") = Some(control.clone());

        let outcome = tokio::select! {
            result = self.provider.recognize(language) => result,
            _ = control.stop.notified() => Err(SpeechError::Cancelled),
        };

        let mut recognizing = self.recognizing.lock().expect("recognition slot poisoned");
        if recognizing
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &control))
        {
            *recognizing = None;
        }

        outcome
    }

    /// Cancel any open recognition session. Idempotent.
    pub fn stop_recognizing(&self) {
        if let Some(control) = self
            .recognizing
            .lock()
            .expect("recognition slot poisoned")
            .take()
        {
            control.stop.notify_one();
        }
    }

    /// Whether a recognition session is open.
    pub fn is_recognizing(&self) -> bool {
        self.recognizing
            .lock()
            .expect("recognition slot poisoned")
            .is_some()
    }

    /// The cached clip for `(language, text)`, if one exists.
    pub fn cached_clip(&self, text: &str, language: Language) -> Option<AudioHandle> {
        self.cache
            .lock()
            .expect("audio cache poisoned")
            .get(&(language, text.to_string()))
            .cloned()
    }

    /// Release every cached audio resource.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("audio cache poisoned").clear();
    }

    /// Synthesize then immediately play.
    pub async fn speak_text(
        &self,
        text: &str,
        language: Language,
    ) -> Result<PlaybackOutcome, SpeechError> {
        let handle = self.synthesize_to_audio(text, language).await?;
        self.play_audio(&handle, true).await
    }
}

// =============================================================================
// Tests
// =============================================================================

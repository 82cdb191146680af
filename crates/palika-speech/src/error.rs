//! Error types for the speech subsystem.

use palika_core::error::PalikaError;

/// Errors from recognition, synthesis, playback, and capture.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech credentials are not configured")]
    SynthesisUnavailable,
    #[error("no speech recognized")]
    NoSpeechDetected,
    #[error("recognition cancelled")]
    Cancelled,
    #[error("speech provider error: {0}")]
    Provider(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("audio capture failed: {0}")]
    Capture(String),
}

impl From<SpeechError> for PalikaError {
    fn from(err: SpeechError) -> Self {
        PalikaError::Speech(err.to_string())
    }
}

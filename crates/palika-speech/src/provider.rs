//! Azure Cognitive Services speech provider (REST) and capture sources.
//!
//! Synthesis posts SSML to the region's TTS endpoint and receives RIFF PCM;
//! recognition posts captured WAV audio to the STT endpoint. The voice and
//! locale are selected by language: `ne-NP-HemkalaNeural` / `ne-NP` for
//! Nepali, `en-US-JennyNeural` / `en-US` for English.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use palika_core::config::SpeechConfig;
use palika_core::types::Language;

use crate::error::SpeechError;
use crate::{AudioCapture, SpeechProvider, SynthesizedAudio};

/// Output format requested from the synthesis endpoint.
const TTS_OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";
/// Bytes per second of the requested output format.
const TTS_BYTES_PER_SEC: usize = 16_000 * 2;
/// Size of the RIFF header preceding PCM data.
const RIFF_HEADER_LEN: usize = 44;

/// REST-backed speech provider.
pub struct AzureSpeechProvider<C> {
    client: reqwest::Client,
    region: String,
    key: String,
    capture: C,
    tts_endpoint: Option<String>,
    stt_endpoint: Option<String>,
}

impl<C: AudioCapture> AzureSpeechProvider<C> {
    /// Build a provider from the speech section of the configuration.
    pub fn new(config: &SpeechConfig, capture: C) -> Self {
        Self {
            client: reqwest::Client::new(),
            region: config.region.clone(),
            key: config.subscription_key.clone(),
            capture,
            tts_endpoint: None,
            stt_endpoint: None,
        }
    }

    /// Override the regional endpoints, e.g. to point at a local stub.
    pub fn with_endpoints(mut self, tts: impl Into<String>, stt: impl Into<String>) -> Self {
        self.tts_endpoint = Some(tts.into());
        self.stt_endpoint = Some(stt.into());
        self
    }

    fn credentials_configured(&self) -> bool {
        !self.key.is_empty() && !self.region.is_empty()
    }

    fn tts_url(&self) -> String {
        self.tts_endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            )
        })
    }

    fn stt_url(&self, language: Language) -> String {
        let base = self.stt_endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
                self.region
            )
        });
        format!(
            "{}?language={}&format=simple",
            base,
            language.recognition_locale()
        )
    }
}

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(rename = "RecognitionStatus")]
    status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: Option<String>,
}

impl<C: AudioCapture> SpeechProvider for AzureSpeechProvider<C> {
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
    ) -> Result<SynthesizedAudio, SpeechError> {
        if !self.credentials_configured() {
            return Err(SpeechError::SynthesisUnavailable);
        }

        let ssml = build_ssml(text, language);
        debug!(voice = language.voice_name(), "Requesting synthesis");

        let response = self
            .client
            .post(self.tts_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", TTS_OUTPUT_FORMAT)
            .body(ssml)
            .send()
            .await
            .map_err(|e| SpeechError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SpeechError::Provider(format!(
                "synthesis rejected with status {}",
                response.status().as_u16()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Provider(e.to_string()))?
            .to_vec();
        let duration = pcm_duration(&audio);

        Ok(SynthesizedAudio { audio, duration })
    }

    async fn recognize(&self, language: Language) -> Result<String, SpeechError> {
        if !self.credentials_configured() {
            return Err(SpeechError::Provider(
                "speech credentials are not configured".to_string(),
            ));
        }

        let audio = self.capture.record().await?;
        debug!(
            locale = language.recognition_locale(),
            bytes = audio.len(),
            "Submitting audio for recognition"
        );

        let response = self
            .client
            .post(self.stt_url(language))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .header("Accept", "application/json")
            .body(audio)
            .send()
            .await
            .map_err(|e| SpeechError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SpeechError::Provider(format!(
                "recognition rejected with status {}",
                response.status().as_u16()
            )));
        }

        let recognized: RecognitionResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Provider(e.to_string()))?;

        match recognized.status.as_str() {
            "Success" => Ok(recognized.display_text.unwrap_or_default()),
            "NoMatch" => Err(SpeechError::NoSpeechDetected),
            other => Err(SpeechError::Provider(format!(
                "recognition ended with status {}",
                other
            ))),
        }
    }
}

/// Wrap text in minimal SSML for the selected voice.
fn build_ssml(text: &str, language: Language) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        language.recognition_locale(),
        language.voice_name(),
        xml_escape(text)
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Playback duration of RIFF 16 kHz 16-bit mono PCM.
fn pcm_duration(audio: &[u8]) -> Duration {
    let data_len = audio.len().saturating_sub(RIFF_HEADER_LEN);
    Duration::from_secs_f64(data_len as f64 / TTS_BYTES_PER_SEC as f64)
}

// =============================================================================
// Capture sources
// =============================================================================

/// Capture source that reads a prerecorded WAV file.
pub struct WavFileCapture {
    path: PathBuf,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioCapture for WavFileCapture {
    async fn record(&self) -> Result<Vec<u8>, SpeechError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| SpeechError::Capture(format!("{}: {}", self.path.display(), e)))
    }
}

/// Capture source for deployments with no recognition input configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioCapture;

impl AudioCapture for NullAudioCapture {
    async fn record(&self) -> Result<Vec<u8>, SpeechError> {
        Err(SpeechError::Capture(
            "no capture source configured".to_string(),
        ))
    }
}

/// Capture source returning fixed bytes, for tests.
#[derive(Debug, Clone, Default)]
pub struct MockAudioCapture {
    data: Vec<u8>,
}

impl MockAudioCapture {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl AudioCapture for MockAudioCapture {
    async fn record(&self) -> Result<Vec<u8>, SpeechError> {
        Ok(self.data.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

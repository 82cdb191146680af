use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PalikaError, Result};

/// Top-level configuration for the Palika assistant.
///
/// Loaded from `~/.palika/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PalikaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl PalikaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PalikaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PalikaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for chat history and stored credentials.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.palika/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// What the controller does when the bot API rejects the access token.
///
/// The observed deployments disagree on 401 semantics, so the behavior is a
/// configuration switch rather than a hardcoded policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailurePolicy {
    /// Clear stored credentials and notify the user the session expired.
    #[default]
    ForceLogout,
    /// Keep credentials and surface a soft warning; guests continue unaffected.
    GuestTolerant,
    /// Propagate the failure to the caller.
    Fatal,
}

/// Remote bot-answer API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Full endpoint URL of the bot query API.
    pub endpoint: String,
    /// Client-side timeout for one query, in seconds.
    pub timeout_secs: u64,
    /// How a rejected access token is handled.
    pub auth_failure_policy: AuthFailurePolicy,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://palika.amigaa.com/api/v1/palika/bot/".to_string(),
            timeout_secs: 30,
            auth_failure_policy: AuthFailurePolicy::ForceLogout,
        }
    }
}

/// Login and token-refresh API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the auth API (`/login/` and `/token/refresh/` are appended).
    pub endpoint: String,
    /// Days before a stored access token expires.
    pub access_token_ttl_days: i64,
    /// Days before a stored refresh token expires.
    pub refresh_token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://palika.amigaa.com/auth/v1".to_string(),
            access_token_ttl_days: 7,
            refresh_token_ttl_days: 30,
        }
    }
}

/// Speech provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Provider region, e.g. "southeastasia".
    pub region: String,
    /// Provider subscription key. Empty means synthesis is unavailable.
    pub subscription_key: String,
    /// Delay before auto-playing a response to voice input, in milliseconds.
    pub autoplay_delay_ms: u64,
    /// Optional WAV file used as the recognition input source.
    pub capture_wav: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            region: "southeastasia".to_string(),
            subscription_key: String::new(),
            autoplay_delay_ms: 500,
            capture_wav: None,
        }
    }
}

/// Conversation behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Quiet period before a changed conversation is written to history,
    /// in milliseconds.
    pub save_debounce_ms: u64,
    /// Milliseconds after the last keystroke before the user counts as no
    /// longer typing.
    pub typing_quiet_ms: u64,
    /// Maximum chats retained per user; oldest are evicted on overflow.
    pub max_chats: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 1500,
            typing_quiet_ms: 1000,
            max_chats: 50,
        }
    }
}

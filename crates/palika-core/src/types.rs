//! Shared domain types: languages, messages, chats, and user profiles.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interface language, which also selects the speech locale and voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ne")]
    Nepali,
}

impl Language {
    /// Two-letter code used in cache keys and persisted preferences.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Nepali => "ne",
        }
    }

    /// BCP-47 locale passed to speech recognition.
    pub fn recognition_locale(&self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Nepali => "ne-NP",
        }
    }

    /// Neural voice used for speech synthesis.
    pub fn voice_name(&self) -> &'static str {
        match self {
            Language::English => "en-US-JennyNeural",
            Language::Nepali => "ne-NP-HemkalaNeural",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "ne" | "nepali" => Ok(Language::Nepali),
            other => Err(format!("unknown language: {}", other)),
        }
    }
}

/// One message in a conversation.
///
/// Immutable once appended, except for `audio_id`, which is attached after
/// the fact when synthesis for the message succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    /// Identifier of the cached audio clip for this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    /// Whether the message was entered by voice rather than typed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_voice_input: bool,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>, is_voice_input: bool) -> Self {
        Self {
            id: ordered_id("user"),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
            audio_id: None,
            is_voice_input,
        }
    }

    /// Create a bot response message.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: ordered_id("bot"),
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
            audio_id: None,
            is_voice_input: false,
        }
    }

    /// Create the bot-side message shown in place of a failed response.
    pub fn error_reply(text: impl Into<String>) -> Self {
        Self {
            id: ordered_id("error"),
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
            audio_id: None,
            is_voice_input: false,
        }
    }
}

/// One persisted conversation: ordered messages plus derived metadata.
///
/// Invariant: `messages` insertion order is chronological order, and `id`
/// is stable for the life of the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// All chats belonging to one user, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryRecord {
    pub user_id: String,
    pub chats: Vec<Chat>,
}

/// Authenticated user profile, as returned by the auth API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub user_id: String,
    pub email_address: String,
    pub name: String,
    pub surname: String,
    pub palika: Option<String>,
    pub is_staff_user: bool,
    pub is_system_admin: bool,
}

// Last millisecond value handed out by `ordered_id`. Bumped past the clock
// when two ids land in the same millisecond so ids stay strictly ordered.
static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generate a unique, generation-ordered id of the form `<prefix>-<millis>`.
pub fn ordered_id(prefix: &str) -> String {
    let now = Utc::now().timestamp_millis();
    let mut assigned = now;
    let _ = LAST_ID_MILLIS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        assigned = last.max(now - 1) + 1;
        Some(assigned)
    });
    format!("{}-{}", prefix, assigned)
}

// =============================================================================
// Tests
// =============================================================================

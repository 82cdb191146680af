//! Title and preview derivation for persisted chats.

use palika_core::i18n::Translations;
use palika_core::types::{Language, Message};

/// Longest title, in characters, before truncation kicks in.
const TITLE_MAX_CHARS: usize = 50;
/// Characters kept when a title is truncated; an ellipsis is appended.
const TITLE_TRUNCATE_CHARS: usize = 47;

/// Longest preview, in characters, before truncation kicks in.
const PREVIEW_MAX_CHARS: usize = 60;
/// Characters kept when a preview is truncated; an ellipsis is appended.
const PREVIEW_TRUNCATE_CHARS: usize = 57;

/// Derive a chat title from the first user message.
///
/// Empty input yields the localized "New Chat" placeholder. Truncation
/// counts characters, not bytes, so Devanagari text never splits a code
/// point.
pub fn generate_chat_title(first_message: &str, language: Language) -> String {
    if first_message.is_empty() {
        return Translations::get(language).new_chat.to_string();
    }

    truncate_chars(first_message, TITLE_MAX_CHARS, TITLE_TRUNCATE_CHARS)
}

/// Derive a chat preview from the last message in the conversation.
pub fn generate_chat_preview(messages: &[Message]) -> String {
    let Some(last) = messages.last() else {
        return String::new();
    };

    truncate_chars(&last.text, PREVIEW_MAX_CHARS, PREVIEW_TRUNCATE_CHARS)
}

fn truncate_chars(text: &str, max: usize, keep: usize) -> String {
    if text.chars().count() > max {
        let mut out: String = text.chars().take(keep).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

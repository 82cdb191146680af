//! Observable state changes emitted by the controller.
//!
//! The view layer subscribes to these instead of polling controller state.

use serde::{Deserialize, Serialize};

use palika_core::types::Message;

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// All state changes a view can react to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChatEvent {
    /// A message was appended to the visible conversation.
    MessageAppended { message: Message },
    /// An existing message changed (audio attached after the fact).
    MessageUpdated { message: Message },
    /// The bot typing indicator changed.
    TypingChanged { typing: bool },
    /// Voice recognition started or stopped listening.
    ListeningChanged { listening: bool },
    /// Audio playback for a message began.
    PlaybackStarted { message_id: String },
    /// Audio playback for a message ended or was stopped.
    PlaybackStopped { message_id: String },
    /// A transient notification for the user.
    Notice {
        severity: NoticeSeverity,
        title: String,
        body: String,
    },
    /// The stored session was rejected and the user was logged out.
    SessionExpired,
    /// A previously saved chat was loaded.
    ChatLoaded { chat_id: String },
    /// The visible conversation was reset.
    ChatCleared,
}

impl ChatEvent {
    /// A stable name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::MessageUpdated { .. } => "message_updated",
            ChatEvent::TypingChanged { .. } => "typing_changed",
            ChatEvent::ListeningChanged { .. } => "listening_changed",
            ChatEvent::PlaybackStarted { .. } => "playback_started",
            ChatEvent::PlaybackStopped { .. } => "playback_stopped",
            ChatEvent::Notice { .. } => "notice",
            ChatEvent::SessionExpired => "session_expired",
            ChatEvent::ChatLoaded { .. } => "chat_loaded",
            ChatEvent::ChatCleared => "chat_cleared",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ChatEvent::SessionExpired.event_name(), "session_expired");
        assert_eq!(ChatEvent::ChatCleared.event_name(), "chat_cleared");
        assert_eq!(
            ChatEvent::TypingChanged { typing: true }.event_name(),
            "typing_changed"
        );
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = ChatEvent::Notice {
            severity: NoticeSeverity::Warning,
            title: "Error".to_string(),
            body: "something happened".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_name(), "notice");
        match back {
            ChatEvent::Notice { severity, .. } => assert_eq!(severity, NoticeSeverity::Warning),
            _ => panic!("wrong variant after round-trip"),
        }
    }

    #[test]
    fn test_message_event_carries_message() {
        let message = Message::bot("hello");
        let event = ChatEvent::MessageAppended {
            message: message.clone(),
        };
        match event {
            ChatEvent::MessageAppended { message: m } => assert_eq!(m, message),
            _ => unreachable!(),
        }
    }
}

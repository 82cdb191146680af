//! Error types for the conversation controller.

use palika_bot::BotError;
use palika_core::error::PalikaError;
use palika_speech::SpeechError;

/// Errors from the chat session controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("another exchange is already in flight")]
    ExchangeInFlight,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error(transparent)]
    Bot(#[from] BotError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
    #[error("history error: {0}")]
    History(String),
}

impl From<ChatError> for PalikaError {
    fn from(err: ChatError) -> Self {
        PalikaError::Chat(err.to_string())
    }
}

//! Palika core crate - shared types, errors, configuration, localization.
//!
//! Every other crate in the workspace depends on this one. It owns the
//! domain vocabulary (messages, chats, users, languages), the top-level
//! error type, the TOML configuration, and the localized string tables.

pub mod config;
pub mod error;
pub mod i18n;
pub mod types;

pub use config::{
    AuthConfig, AuthFailurePolicy, BotConfig, ChatConfig, GeneralConfig, PalikaConfig,
    SpeechConfig,
};
pub use error::{PalikaError, Result};
pub use i18n::Translations;
pub use types::{ordered_id, Chat, ChatHistoryRecord, Language, Message, UserData};

//! Palika history crate - durable per-user conversation storage.
//!
//! Provides the JSON-document `HistoryStore` with list/get/save/delete/clear
//! operations plus the title and preview derivation rules used when a
//! conversation is persisted.

pub mod derive;
pub mod store;

pub use derive::{generate_chat_preview, generate_chat_title};
pub use store::HistoryStore;

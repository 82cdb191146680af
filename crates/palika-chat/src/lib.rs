//! Palika chat crate - the conversation controller and its supporting
//! machinery.
//!
//! Owns the visible message list, sequences user input -> bot call ->
//! optional synthesis -> optional autoplay, and reconciles the conversation
//! with the history store through a debounced write-behind saver. State
//! changes stream out as `ChatEvent`s for the view layer.

pub mod controller;
pub mod error;
pub mod events;
pub mod saver;

pub use controller::ChatController;
pub use error::ChatError;
pub use events::{ChatEvent, NoticeSeverity};
pub use saver::{DebouncedSaver, SaveRequest, SaveSink};

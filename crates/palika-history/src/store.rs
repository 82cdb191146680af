//! JSON-blob persistence for per-user chat history.
//!
//! The whole collection lives in one document under the data directory,
//! keyed by user id, mirroring the browser storage layout this store
//! replaces. Reads fail soft: an absent or corrupt document is treated as
//! empty history so the chat experience is never blocked by storage.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use palika_core::error::{PalikaError, Result};
use palika_core::types::{Chat, ChatHistoryRecord};

/// File name of the history document inside the data directory.
const HISTORY_FILE: &str = "chat_history.json";

/// Durable per-user conversation storage.
pub struct HistoryStore {
    path: PathBuf,
    max_chats: usize,
}

impl HistoryStore {
    /// Create a store rooted at the given data directory.
    ///
    /// `max_chats` bounds how many chats one user may keep; the oldest are
    /// evicted on overflow.
    pub fn new(data_dir: &Path, max_chats: usize) -> Self {
        Self {
            path: data_dir.join(HISTORY_FILE),
            max_chats,
        }
    }

    /// All chats for a user, newest first.
    ///
    /// Returns an empty list when nothing is stored, the document is
    /// malformed, or the user has no record. Never errors.
    pub fn get_history(&self, user_id: &str) -> Vec<Chat> {
        self.read_all()
            .into_iter()
            .find(|record| record.user_id == user_id)
            .map(|record| record.chats)
            .unwrap_or_default()
    }

    /// Insert or update one chat for a user.
    ///
    /// A chat id not yet present is inserted at the front; an existing id is
    /// replaced in place, keeping its position. After an insert the list is
    /// truncated to the newest `max_chats` entries.
    pub fn save_chat(&self, user_id: &str, chat: &Chat) -> Result<()> {
        let mut records = self.read_all();

        match records.iter_mut().find(|r| r.user_id == user_id) {
            Some(record) => {
                match record.chats.iter_mut().find(|c| c.id == chat.id) {
                    Some(existing) => *existing = chat.clone(),
                    None => record.chats.insert(0, chat.clone()),
                }
                record.chats.truncate(self.max_chats);
            }
            None => {
                records.push(ChatHistoryRecord {
                    user_id: user_id.to_string(),
                    chats: vec![chat.clone()],
                });
            }
        }

        self.write_all(&records)
    }

    /// Look up one chat by id.
    pub fn get_chat_by_id(&self, user_id: &str, chat_id: &str) -> Option<Chat> {
        self.get_history(user_id)
            .into_iter()
            .find(|chat| chat.id == chat_id)
    }

    /// Remove one chat. Removing an id that does not exist is a no-op.
    pub fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<()> {
        let mut records = self.read_all();

        let Some(record) = records.iter_mut().find(|r| r.user_id == user_id) else {
            return Ok(());
        };
        record.chats.retain(|c| c.id != chat_id);

        self.write_all(&records)
    }

    /// Remove a user's entire record.
    ///
    /// When the user held the only record, the backing document is removed
    /// as well.
    pub fn clear_history(&self, user_id: &str) -> Result<()> {
        let mut records = self.read_all();
        records.retain(|r| r.user_id != user_id);

        if records.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PalikaError::History(format!(
                    "Failed to remove history file: {}",
                    e
                ))),
            }
        } else {
            self.write_all(&records)
        }
    }

    // -- Private helpers --

    fn read_all(&self) -> Vec<ChatHistoryRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read chat history: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("Malformed chat history document, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    fn write_all(&self, records: &[ChatHistoryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(records)?;
        std::fs::write(&self.path, content)?;
        debug!(
            records = records.len(),
            "Chat history written to {}",
            self.path.display()
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use palika_core::types::Message;

    fn make_store(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::new(dir.path(), 50)
    }

    fn make_chat(id: &str, text: &str) -> Chat {
        Chat {
            id: id.to_string(),
            title: text.to_string(),
            preview: text.to_string(),
            messages: vec![Message::user(text, false), Message::bot("answer")],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_store_returns_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        assert!(store.get_history("u1").is_empty());
    }

    #[test]
    fn test_save_then_get_by_id_preserves_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        let chat = make_chat("c1", "hello");
        store.save_chat("u1", &chat).unwrap();

        let found = store.get_chat_by_id("u1", "c1").unwrap();
        assert_eq!(found.id, "c1");
        assert_eq!(found.messages, chat.messages);
    }

    #[test]
    fn test_new_chats_insert_at_front() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "first")).unwrap();
        store.save_chat("u1", &make_chat("c2", "second")).unwrap();

        let history = store.get_history("u1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "c2");
        assert_eq!(history[1].id, "c1");
    }

    #[test]
    fn test_update_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "first")).unwrap();
        store.save_chat("u1", &make_chat("c2", "second")).unwrap();

        let mut updated = make_chat("c1", "first");
        updated.preview = "updated preview".to_string();
        store.save_chat("u1", &updated).unwrap();

        let history = store.get_history("u1");
        assert_eq!(history.len(), 2);
        // Updated chat keeps its original position.
        assert_eq!(history[0].id, "c2");
        assert_eq!(history[1].id, "c1");
        assert_eq!(history[1].preview, "updated preview");
    }

    #[test]
    fn test_overflow_keeps_newest_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        for i in 0..51 {
            let id = format!("c{}", i);
            store.save_chat("u1", &make_chat(&id, "text")).unwrap();
        }

        let history = store.get_history("u1");
        assert_eq!(history.len(), 50);
        // The 50 most recently saved survive; the first is evicted.
        assert_eq!(history[0].id, "c50");
        assert_eq!(history[49].id, "c1");
        assert!(store.get_chat_by_id("u1", "c0").is_none());
    }

    #[test]
    fn test_delete_chat() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "hello")).unwrap();
        store.delete_chat("u1", "c1").unwrap();

        assert!(store.get_chat_by_id("u1", "c1").is_none());
        assert!(store.get_history("u1").is_empty());
    }

    #[test]
    fn test_delete_nonexistent_chat_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "hello")).unwrap();
        store.delete_chat("u1", "missing").unwrap();
        store.delete_chat("unknown-user", "c1").unwrap();

        assert_eq!(store.get_history("u1").len(), 1);
    }

    #[test]
    fn test_clear_history_removes_user_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "one")).unwrap();
        store.save_chat("u2", &make_chat("c2", "two")).unwrap();

        store.clear_history("u1").unwrap();

        assert!(store.get_history("u1").is_empty());
        assert_eq!(store.get_history("u2").len(), 1);
    }

    #[test]
    fn test_clear_history_last_user_removes_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "one")).unwrap();
        store.clear_history("u1").unwrap();

        assert!(!dir.path().join(HISTORY_FILE).exists());
    }

    #[test]
    fn test_clear_history_when_nothing_stored_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        store.clear_history("u1").unwrap();
    }

    #[test]
    fn test_corrupt_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), "{ not json").unwrap();

        let store = make_store(&dir);
        assert!(store.get_history("u1").is_empty());
        assert!(store.get_chat_by_id("u1", "c1").is_none());
    }

    #[test]
    fn test_corrupt_document_recovers_on_save() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), "[[[").unwrap();

        let store = make_store(&dir);
        store.save_chat("u1", &make_chat("c1", "hello")).unwrap();
        assert_eq!(store.get_history("u1").len(), 1);
    }

    #[test]
    fn test_users_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save_chat("u1", &make_chat("c1", "one")).unwrap();
        store.save_chat("u2", &make_chat("c1", "two")).unwrap();

        assert_eq!(store.get_chat_by_id("u1", "c1").unwrap().title, "one");
        assert_eq!(store.get_chat_by_id("u2", "c1").unwrap().title, "two");
    }

    #[test]
    fn test_small_cap_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), 2);

        store.save_chat("u1", &make_chat("c1", "one")).unwrap();
        store.save_chat("u1", &make_chat("c2", "two")).unwrap();
        store.save_chat("u1", &make_chat("c3", "three")).unwrap();

        let history = store.get_history("u1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "c3");
        assert_eq!(history[1].id, "c2");
    }

    #[test]
    fn test_history_survives_store_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = make_store(&dir);
            store.save_chat("u1", &make_chat("c1", "hello")).unwrap();
        }
        let reopened = make_store(&dir);
        assert_eq!(reopened.get_history("u1").len(), 1);
    }
}

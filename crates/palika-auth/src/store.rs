//! File-backed credential store.
//!
//! Persists the access token, refresh token, and user profile under the data
//! directory with independent expiries (7-day access, 30-day refresh by
//! default). This store is the sole writer of credential state; the bot
//! client and controller only read through it. Corrupt or expired entries
//! read as logged-out.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use palika_core::error::{PalikaError, Result};
use palika_core::types::UserData;

use crate::client::LoginResponse;

/// File name of the credential document inside the data directory.
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredentials {
    access_token: String,
    access_expires_at: DateTime<Utc>,
    refresh_token: String,
    refresh_expires_at: DateTime<Utc>,
    user: UserData,
}

/// Persistent token and profile storage.
pub struct CredentialStore {
    path: PathBuf,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialStore {
    /// Create a store rooted at the given data directory.
    pub fn new(data_dir: &Path, access_ttl_days: i64, refresh_ttl_days: i64) -> Self {
        Self {
            path: data_dir.join(CREDENTIALS_FILE),
            access_ttl: Duration::days(access_ttl_days),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    /// Persist a successful login, stamping both token expiries.
    pub fn save(&self, login: &LoginResponse) -> Result<()> {
        let now = Utc::now();
        let stored = StoredCredentials {
            access_token: login.access_token.clone(),
            access_expires_at: now + self.access_ttl,
            refresh_token: login.refresh_token.clone(),
            refresh_expires_at: now + self.refresh_ttl,
            user: UserData {
                user_id: login.user_id.clone(),
                email_address: login.email_address.clone(),
                name: login.name.clone(),
                surname: login.surname.clone(),
                palika: login.palika.clone(),
                is_staff_user: login.is_staff_user,
                is_system_admin: login.is_system_admin,
            },
        };
        self.write(&stored)
    }

    /// The access token, if present and unexpired.
    pub fn access_token(&self) -> Option<String> {
        let stored = self.read()?;
        if stored.access_expires_at <= Utc::now() {
            debug!("Stored access token has expired");
            return None;
        }
        Some(stored.access_token)
    }

    /// The refresh token, if present and unexpired.
    pub fn refresh_token(&self) -> Option<String> {
        let stored = self.read()?;
        if stored.refresh_expires_at <= Utc::now() {
            debug!("Stored refresh token has expired");
            return None;
        }
        Some(stored.refresh_token)
    }

    /// The stored user profile, if any.
    pub fn user(&self) -> Option<UserData> {
        self.read().map(|stored| stored.user)
    }

    /// Whether a usable access token and profile are present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() && self.user().is_some()
    }

    /// Replace the access token after a refresh, restamping its expiry.
    pub fn update_access_token(&self, token: &str) -> Result<()> {
        let Some(mut stored) = self.read() else {
            return Err(PalikaError::Auth(
                "cannot update access token without stored credentials".to_string(),
            ));
        };
        stored.access_token = token.to_string();
        stored.access_expires_at = Utc::now() + self.access_ttl;
        self.write(&stored)
    }

    /// Remove all stored credentials. Idempotent.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PalikaError::Auth(format!(
                "Failed to clear credentials: {}",
                e
            ))),
        }
    }

    // -- Private helpers --

    fn read(&self) -> Option<StoredCredentials> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read credentials: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!("Malformed credential document, treating as logged out: {}", e);
                None
            }
        }
    }

    fn write(&self, stored: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(stored)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_login() -> LoginResponse {
        LoginResponse {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            email_address: "asha@example.com".to_string(),
            user_id: "u1".to_string(),
            name: "Asha".to_string(),
            surname: "Karki".to_string(),
            palika: Some("Kathmandu".to_string()),
            is_staff_user: false,
            is_system_admin: false,
        }
    }

    fn make_store(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(dir.path(), 7, 30)
    }

    #[test]
    fn test_empty_store_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_save_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save(&make_login()).unwrap();

        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        let user = store.user().unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.palika.as_deref(), Some("Kathmandu"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_expired_access_token_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        // Zero-day TTL: the token expires the instant it is written.
        let store = CredentialStore::new(dir.path(), 0, 30);

        store.save(&make_login()).unwrap();

        assert!(store.access_token().is_none());
        assert!(!store.is_authenticated());
        // The refresh token is still usable.
        assert!(store.refresh_token().is_some());
    }

    #[test]
    fn test_expired_refresh_token_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path(), 7, 0);

        store.save(&make_login()).unwrap();
        assert!(store.refresh_token().is_none());
        assert!(store.access_token().is_some());
    }

    #[test]
    fn test_update_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save(&make_login()).unwrap();
        store.update_access_token("access-2").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("access-2"));
        // Refresh token and profile are untouched.
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(store.user().unwrap().user_id, "u1");
    }

    #[test]
    fn test_update_access_token_without_credentials_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        assert!(store.update_access_token("access-2").is_err());
    }

    #[test]
    fn test_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        store.save(&make_login()).unwrap();
        store.clear().unwrap();

        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_document_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "{ nope").unwrap();

        let store = make_store(&dir);
        assert!(store.access_token().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_credentials_survive_store_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = make_store(&dir);
            store.save(&make_login()).unwrap();
        }
        let reopened = make_store(&dir);
        assert!(reopened.is_authenticated());
    }
}

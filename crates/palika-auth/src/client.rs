//! HTTP client for the login and token-refresh API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use palika_core::config::AuthConfig;
use palika_core::error::PalikaError;
use palika_core::types::UserData;

use crate::store::CredentialStore;

/// Errors from the auth API.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("auth service unreachable: {0}")]
    Unreachable(String),
    #[error("malformed auth response: {0}")]
    Malformed(String),
    #[error("credential storage failed: {0}")]
    Storage(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<AuthError> for PalikaError {
    fn from(err: AuthError) -> Self {
        PalikaError::Auth(err.to_string())
    }
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email_address: String,
    pub password: String,
}

/// Successful login response body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub email_address: String,
    pub user_id: String,
    pub name: String,
    pub surname: String,
    pub palika: Option<String>,
    pub is_staff_user: bool,
    pub is_system_admin: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Client for the login/token-refresh endpoints, writing through the
/// credential store.
pub struct AuthClient {
    client: reqwest::Client,
    endpoint: String,
    store: Arc<CredentialStore>,
}

impl AuthClient {
    /// Build a client from the auth section of the configuration.
    pub fn new(config: &AuthConfig, store: Arc<CredentialStore>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            store,
        })
    }

    /// Log in with email and password, persisting tokens and profile on
    /// success.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserData, AuthError> {
        let url = format!("{}/login/", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let detail = response
                .json::<ErrorDetail>()
                .await
                .ok()
                .and_then(|d| d.detail)
                .unwrap_or_else(|| "Login failed".to_string());
            return Err(AuthError::LoginFailed(detail));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        self.store
            .save(&login)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(user = %login.email_address, "Login succeeded");
        let user = self
            .store
            .user()
            .ok_or_else(|| AuthError::Storage("saved profile unreadable".to_string()))?;
        Ok(user)
    }

    /// Clear stored credentials.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Logout failed to clear credentials: {}", e);
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns the new token on success. Any failure clears the stored
    /// credentials (forced logout) and yields `None`.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let refresh = self.store.refresh_token()?;

        let url = format!("{}/token/refresh/", self.endpoint);
        let response = match self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.logout();
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token refresh rejected");
            self.logout();
            return None;
        }

        let refreshed: RefreshResponse = match response.json().await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!("Malformed token refresh response: {}", e);
                self.logout();
                return None;
            }
        };

        if let Err(e) = self.store.update_access_token(&refreshed.access) {
            warn!("Failed to persist refreshed access token: {}", e);
            self.logout();
            return None;
        }

        Some(refreshed.access)
    }
}

// =============================================================================
// Tests
// =============================================================================

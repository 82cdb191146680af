//! Palika auth crate - credential persistence and the login/token-refresh
//! client.
//!
//! The `CredentialStore` is the sole writer of token and profile state;
//! every other component is a read-only consumer. The `AuthClient` talks to
//! the remote auth API and writes through the store.

pub mod client;
pub mod store;

pub use client::{AuthClient, AuthError, LoginCredentials, LoginResponse};
pub use store::CredentialStore;

//! Bearer credential management.
//!
//! ```text
//! TokenExchange (password grant) → TokenManager → CredentialSource readers
//! ```
//!
//! [`TokenManager`] holds the current [`AccessCredential`] and replaces it
//! from a background task at half of each credential's lifetime.

pub mod manager;
pub mod password_grant;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;

pub use manager::TokenManager;
pub use password_grant::PasswordGrant;

/// An opaque bearer value and how long it stays valid after issue.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub expires_in: Duration,
}

impl AccessCredential {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_in,
        }
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Trades configured credentials for a fresh [`AccessCredential`].
#[async_trait]
pub trait TokenExchange {
    async fn exchange(&self) -> Result<AccessCredential>;
}

/// Read side of credential management, used by API clients.
pub trait CredentialSource {
    fn current_token(&self) -> Arc<AccessCredential>;
}

/// A credential that never changes. Useful for one-shot tools and tests.
pub struct StaticCredential(Arc<AccessCredential>);

impl StaticCredential {
    pub fn new(credential: AccessCredential) -> Self {
        Self(Arc::new(credential))
    }
}

impl CredentialSource for StaticCredential {
    fn current_token(&self) -> Arc<AccessCredential> {
        self.0.clone()
    }
}

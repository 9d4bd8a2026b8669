//! Conjur REST API access
//!
//! Two calls make up a variable read: `authenticate` trades a host's API key
//! for a short-lived access token, and `fetch_secret` reads one variable with
//! that token. [`pull_secret`] composes them, fetching a fresh token per read.
//!
//! Success is decided by HTTP status only. A variable whose value happens to
//! contain words like `error` is returned as-is. Values are raw bytes since
//! variables may hold binary content such as keystores.

mod client;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub use client::{ConjurClient, DEFAULT_REQUEST_TIMEOUT};

/// Errors from the Conjur API. Response bodies of successful reads never end up here.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, TLS, timeout or body read failure
    #[error("network error communicating with conjur: {0}")]
    Transport(#[source] reqwest::Error),

    /// API key or access token was rejected (401/403)
    #[error("conjur rejected the credentials")]
    Unauthorized,

    /// The variable (or its value) does not exist (404)
    #[error("conjur variable not found: {0}")]
    NotFound(String),

    /// The request was malformed in Conjur's eyes (400/422)
    #[error("conjur rejected the request (status {status}): {message}")]
    Rejected {
        /// HTTP status returned
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// Any other non-success status
    #[error("unexpected conjur response status {0}")]
    UnexpectedStatus(u16),
}

impl VaultError {
    /// Whether the next scheduled pass has a chance of succeeding unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            VaultError::Transport(_) => true,
            VaultError::UnexpectedStatus(code) => *code == 429 || *code >= 500,
            VaultError::Client(_)
            | VaultError::Unauthorized
            | VaultError::NotFound(_)
            | VaultError::Rejected { .. } => false,
        }
    }
}

/// A Conjur host API key
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw API key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, as sent in the authenticate request body
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no key could be resolved
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_empty() {
            "ApiKey(<empty>)"
        } else {
            "ApiKey(<redacted>)"
        })
    }
}

/// A Conjur access token, valid for a single variable read
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token as returned by the authenticate endpoint
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Token token=\"{}\"", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Escape a value for use as one path segment of a Conjur URL
///
/// Only `/` is rewritten (to `%2F`); every other character passes through.
pub fn encode_path_segment(segment: &str) -> String {
    segment.replace('/', "%2F")
}

/// Conjur API operations
///
/// `identity` and `secret_id` are embedded into the URL path verbatim;
/// callers pass them through [`encode_path_segment`] first.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Exchange a host API key for an access token
    async fn authenticate(
        &self,
        host: &str,
        account: &str,
        identity: &str,
        api_key: &ApiKey,
    ) -> Result<AuthToken, VaultError>;

    /// Read the current value of a variable, byte for byte
    async fn fetch_secret(
        &self,
        host: &str,
        account: &str,
        secret_id: &str,
        token: &AuthToken,
    ) -> Result<Vec<u8>, VaultError>;
}

/// Authenticate as `identity` and read `secret_id`
///
/// Both identifiers are path-encoded here, once.
pub async fn pull_secret(
    vault: &dyn VaultApi,
    host: &str,
    account: &str,
    identity: &str,
    secret_id: &str,
    api_key: &ApiKey,
) -> Result<Vec<u8>, VaultError> {
    let identity = encode_path_segment(identity);
    let secret_id = encode_path_segment(secret_id);

    let token = vault.authenticate(host, account, &identity, api_key).await?;
    vault.fetch_secret(host, account, &secret_id, &token).await
}

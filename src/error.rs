//! Error types for the Conjur operator

use thiserror::Error;

use crate::vault::VaultError;

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Conjur request failed or was rejected
    #[error("conjur error: {0}")]
    Vault(#[from] VaultError),

    /// A namespaced resource arrived without a namespace
    #[error("resource {0} has no namespace")]
    MissingNamespace(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is worth retrying on the next pass
    ///
    /// Kubernetes 4xx responses other than conflicts need a spec or RBAC
    /// change; everything transient (connection, timeout, 5xx) is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => ae.code == 409 || !(400..500).contains(&ae.code),
            Error::Kube(_) => true,
            Error::Vault(e) => e.is_retryable(),
            Error::MissingNamespace(_) => false,
            Error::Internal(_) => true,
        }
    }
}

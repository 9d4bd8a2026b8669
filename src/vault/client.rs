//! reqwest-backed Conjur client
//!
//! Certificate verification is disabled: the operator is expected to reach
//! Conjur over a trusted network, often through an internal CA it does not
//! carry. Every request is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{ApiKey, AuthToken, VaultApi, VaultError};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error message kept from a rejected response
const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// Conjur REST API client
#[derive(Debug, Clone)]
pub struct ConjurClient {
    http: reqwest::Client,
    scheme: &'static str,
}

impl ConjurClient {
    fn user_agent() -> String {
        format!("conjur-operator/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Create an HTTPS client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, VaultError> {
        let http = reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(VaultError::Client)?;

        Ok(Self {
            http,
            scheme: "https",
        })
    }

    /// Plain-HTTP client for talking to a local mock server
    #[cfg(test)]
    fn plain_http(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            http,
            scheme: "http",
        }
    }

    fn authenticate_url(&self, host: &str, account: &str, identity: &str) -> String {
        format!(
            "{}://{host}/authn/{account}/{identity}/authenticate",
            self.scheme
        )
    }

    fn variable_url(&self, host: &str, account: &str, secret_id: &str) -> String {
        format!(
            "{}://{host}/secrets/{account}/variable/{secret_id}",
            self.scheme
        )
    }
}

#[async_trait]
impl VaultApi for ConjurClient {
    async fn authenticate(
        &self,
        host: &str,
        account: &str,
        identity: &str,
        api_key: &ApiKey,
    ) -> Result<AuthToken, VaultError> {
        let url = self.authenticate_url(host, account, identity);
        debug!(%host, %account, %identity, "authenticating to conjur");

        let resp = self
            .http
            .post(&url)
            .header("Accept-Encoding", "base64")
            .body(api_key.as_str().to_owned())
            .send()
            .await
            .map_err(VaultError::Transport)?;

        let body = read_body(resp, identity).await?;
        Ok(AuthToken::new(String::from_utf8_lossy(&body)))
    }

    async fn fetch_secret(
        &self,
        host: &str,
        account: &str,
        secret_id: &str,
        token: &AuthToken,
    ) -> Result<Vec<u8>, VaultError> {
        let url = self.variable_url(host, account, secret_id);
        debug!(%host, %account, %secret_id, "fetching conjur variable");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", token.authorization_header())
            .header("Accept", "*/*")
            .send()
            .await
            .map_err(VaultError::Transport)?;

        read_body(resp, secret_id).await
    }
}

/// Read a response body, mapping non-success statuses to errors
async fn read_body(resp: reqwest::Response, subject: &str) -> Result<Vec<u8>, VaultError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(VaultError::Transport)?;
    classify(status, body.to_vec(), subject)
}

fn classify(status: StatusCode, body: Vec<u8>, subject: &str) -> Result<Vec<u8>, VaultError> {
    match status.as_u16() {
        200..=299 => Ok(body),
        401 | 403 => Err(VaultError::Unauthorized),
        404 => Err(VaultError::NotFound(subject.to_string())),
        400 | 422 => Err(VaultError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        }),
        code => Err(VaultError::UnexpectedStatus(code)),
    }
}

/// Pull `error.message` out of a Conjur error body, falling back to the raw text
fn error_message(body: &[u8]) -> String {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

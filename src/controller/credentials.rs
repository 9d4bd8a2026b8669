//! Conjur API key lookup
//!
//! The key lives base64-encoded in the `apikey` field of a Secret next to the
//! Conjur resource. Any failure to obtain it degrades to an empty key: the
//! pass continues and authentication fails per entry instead.

use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::api::core::v1::Secret;
use tracing::{debug, warn};

use super::KubeClient;
use crate::vault::ApiKey;
use crate::API_KEY_FIELD;

/// Resolve the API key stored in `secret_name`, or an empty key
pub async fn resolve_api_key(kube: &dyn KubeClient, namespace: &str, secret_name: &str) -> ApiKey {
    if secret_name.is_empty() {
        warn!(%namespace, "no apiKeyFromSecret configured, using empty API key");
        return ApiKey::default();
    }

    match kube.get_secret(namespace, secret_name).await {
        Ok(Some(secret)) => match api_key_from_secret(&secret) {
            Some(key) => {
                debug!(%namespace, secret = %secret_name, "pulled API key from secret");
                key
            }
            None => {
                warn!(
                    %namespace,
                    secret = %secret_name,
                    "API key secret has no decodable apikey field, using empty API key"
                );
                ApiKey::default()
            }
        },
        Ok(None) => {
            warn!(%namespace, secret = %secret_name, "API key secret not found, using empty API key");
            ApiKey::default()
        }
        Err(e) => {
            warn!(
                %namespace,
                secret = %secret_name,
                error = %e,
                "failed to read API key secret, using empty API key"
            );
            ApiKey::default()
        }
    }
}

/// Decode the `apikey` field: base64 text, line breaks tolerated, newlines stripped
fn api_key_from_secret(secret: &Secret) -> Option<ApiKey> {
    let raw = secret.data.as_ref()?.get(API_KEY_FIELD)?;
    let encoded: Vec<u8> = raw
        .0
        .iter()
        .copied()
        .filter(|b| !matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
        .collect();
    let decoded = STANDARD.decode(encoded).ok()?;
    let key = String::from_utf8(decoded).ok()?.replace('\n', "");
    Some(ApiKey::new(key))
}

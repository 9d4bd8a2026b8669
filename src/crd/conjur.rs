//! Conjur Custom Resource Definition
//!
//! A `Conjur` resource declares which Conjur variables should be mirrored into
//! which Secrets of its namespace, and how to authenticate to fetch them.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_REFRESH_INTERVAL_SECS;

/// Specification for a Conjur sync resource
///
/// Example:
/// ```yaml
/// apiVersion: conjur.sync.dev/v1alpha1
/// kind: Conjur
/// metadata:
///   name: app-secrets
///   namespace: payments
/// spec:
///   refreshInterval: 300
///   apiKeyFromSecret: conjur-api-key
///   conjurHost: conjur.internal.example.com
///   conjurAcct: prod
///   hostname: host/payments/app
///   data:
///     db-pass:
///       secretIdentifier: payments/db/password
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "conjur.sync.dev",
    version = "v1alpha1",
    kind = "Conjur",
    plural = "conjurs",
    namespaced,
    status = "ConjurStatus",
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.conjurHost"}"#,
    printcolumn = r#"{"name":"Synced","type":"integer","jsonPath":".status.syncedCount"}"#,
    printcolumn = r#"{"name":"Failed","type":"integer","jsonPath":".status.failedCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConjurSpec {
    /// Seconds between syncs; anything below 60 (or unset) means 60
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<i64>,

    /// Name of the Secret (same namespace) whose `apikey` field holds the
    /// base64-encoded Conjur API key
    #[serde(default)]
    pub api_key_from_secret: String,

    /// Conjur server host (and optional port), without scheme
    pub conjur_host: String,

    /// Conjur account
    #[serde(rename = "conjurAcct")]
    pub conjur_account: String,

    /// Host identity to authenticate as (e.g. `host/payments/app`)
    pub hostname: String,

    /// Target Secret name -> Conjur variable to mirror into it
    #[serde(default)]
    pub data: BTreeMap<String, SecretToPull>,
}

/// A single Conjur variable to mirror
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretToPull {
    /// Conjur variable identifier (e.g. `payments/db/password`)
    pub secret_identifier: String,
}

impl SecretToPull {
    /// Create a new variable reference
    pub fn new(secret_identifier: impl Into<String>) -> Self {
        Self {
            secret_identifier: secret_identifier.into(),
        }
    }
}

impl ConjurSpec {
    /// Delay before this resource should be reconciled again
    pub fn requeue_interval(&self) -> Duration {
        refresh_interval(self.refresh_interval)
    }
}

/// Resolve a declared refresh interval, enforcing the 60 second floor
///
/// `None` stands for "no declared value" (absent field, or the resource could
/// not be read at all) and resolves to the floor as well.
pub fn refresh_interval(declared_secs: Option<i64>) -> Duration {
    let secs = declared_secs
        .and_then(|secs| u64::try_from(secs).ok())
        .map_or(DEFAULT_REFRESH_INTERVAL_SECS, |secs| {
            secs.max(DEFAULT_REFRESH_INTERVAL_SECS)
        });
    Duration::from_secs(secs)
}

/// Observed sync state of a Conjur resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConjurStatus {
    /// Generation of the spec the last pass ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Number of entries whose last sync succeeded
    #[serde(default)]
    pub synced_count: u32,

    /// Number of entries whose last sync failed
    #[serde(default)]
    pub failed_count: u32,

    /// Per target Secret outcome of the last pass
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretSyncStatus>,
}

/// Outcome of syncing one target Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretSyncStatus {
    /// Whether the last attempt wrote the current value
    pub synced: bool,

    /// Failure description when `synced` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When `synced`/`message` last changed (RFC3339)
    pub last_transition_time: String,
}

impl SecretSyncStatus {
    /// Same outcome, ignoring the transition timestamp
    pub fn same_outcome(&self, other: &SecretSyncStatus) -> bool {
        self.synced == other.synced && self.message == other.message
    }
}

impl ConjurStatus {
    /// Whether `self` differs from `current` in anything but timestamps
    pub fn differs_from(&self, current: Option<&ConjurStatus>) -> bool {
        let Some(current) = current else {
            return true;
        };
        if self.observed_generation != current.observed_generation
            || self.synced_count != current.synced_count
            || self.failed_count != current.failed_count
            || self.secrets.len() != current.secrets.len()
        {
            return true;
        }
        self.secrets.iter().any(|(name, entry)| {
            !current
                .secrets
                .get(name)
                .is_some_and(|prev| entry.same_outcome(prev))
        })
    }
}

//! Conjur reconciliation
//!
//! A pass never fails because of a single entry. Vault and persistence
//! failures are logged, recorded in the resource status, and retried on the
//! next pass. Only failing to read the resource itself is an error.
//!
//! A status write bumps the resource version, so the watcher schedules one
//! extra pass right after it. That pass re-pulls every entry ahead of the
//! refresh interval; when its outcomes match, no status is written and the
//! resource settles until the next requeue.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::{materialize, resolve_api_key, KubeClient, KubeClientImpl};
use crate::crd::{refresh_interval, Conjur, ConjurSpec, ConjurStatus, SecretSyncStatus};
use crate::vault::{pull_secret, ApiKey, ConjurClient, VaultApi};
use crate::Error;

/// Shared state for the Conjur controller
pub struct Context {
    /// Kubernetes API access
    pub kube: Arc<dyn KubeClient>,
    /// Conjur API access
    pub vault: Arc<dyn VaultApi>,
}

impl Context {
    /// Create a context backed by a live cluster and Conjur client
    pub fn new(client: Client, vault: ConjurClient) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client)),
            vault: Arc::new(vault),
        }
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, vault: Arc<dyn VaultApi>) -> Self {
        Self { kube, vault }
    }
}

/// Controller entry point: reconcile one Conjur resource
///
/// Returns `Action::requeue` with the resource's effective refresh interval.
pub async fn reconcile(conjur: Arc<Conjur>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = conjur.name_any();
    let namespace = conjur
        .namespace()
        .ok_or_else(|| Error::MissingNamespace(name.clone()))?;

    let interval = reconcile_named(&ctx, &namespace, &name).await?;
    Ok(Action::requeue(interval))
}

/// Run one sync pass for `namespace/name` and return the requeue delay
///
/// The resource is re-read so the pass always sees the latest spec. A
/// resource that no longer exists resolves to the default interval.
#[instrument(skip(ctx))]
pub async fn reconcile_named(ctx: &Context, namespace: &str, name: &str) -> Result<Duration, Error> {
    info!("reconciling conjur resource");

    let Some(conjur) = ctx.kube.get_conjur(namespace, name).await? else {
        debug!("conjur resource not found, nothing to sync");
        return Ok(refresh_interval(None));
    };

    let spec = &conjur.spec;
    let api_key = resolve_api_key(ctx.kube.as_ref(), namespace, &spec.api_key_from_secret).await;

    let mut outcomes = BTreeMap::new();
    for (secret_name, to_pull) in &spec.data {
        let identifier = &to_pull.secret_identifier;
        let outcome = match sync_entry(ctx, namespace, spec, secret_name, identifier, &api_key).await
        {
            Ok(true) => {
                info!(secret = %secret_name, "created secret");
                Ok(())
            }
            Ok(false) => {
                info!(secret = %secret_name, "synced secret");
                Ok(())
            }
            Err(e) => {
                warn!(
                    secret = %secret_name,
                    secret_identifier = %identifier,
                    retryable = e.is_retryable(),
                    error = %e,
                    "failed to sync secret"
                );
                Err(e.to_string())
            }
        };
        outcomes.insert(secret_name.clone(), outcome);
    }

    report_status(ctx, namespace, name, &conjur, &outcomes).await;

    let interval = spec.requeue_interval();
    debug!(requeue_secs = interval.as_secs(), "reconciliation complete");
    Ok(interval)
}

/// Error policy for the controller
///
/// Failed passes are retried at the resource's own refresh interval.
pub fn error_policy(conjur: Arc<Conjur>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        conjur = %conjur.name_any(),
        namespace = ?conjur.namespace(),
        "reconciliation failed"
    );
    Action::requeue(conjur.spec.requeue_interval())
}

/// Pull one value and write it to its target Secret
async fn sync_entry(
    ctx: &Context,
    namespace: &str,
    spec: &ConjurSpec,
    secret_name: &str,
    secret_identifier: &str,
    api_key: &ApiKey,
) -> Result<bool, Error> {
    let value = pull_secret(
        ctx.vault.as_ref(),
        &spec.conjur_host,
        &spec.conjur_account,
        &spec.hostname,
        secret_identifier,
        api_key,
    )
    .await?;
    materialize(ctx.kube.as_ref(), namespace, secret_name, &value).await
}

/// Publish per-entry outcomes, skipping the write when nothing changed
///
/// Status write failures are logged only; the Secrets are already written.
async fn report_status(
    ctx: &Context,
    namespace: &str,
    name: &str,
    conjur: &Conjur,
    outcomes: &BTreeMap<String, Result<(), String>>,
) {
    let now = chrono::Utc::now().to_rfc3339();
    let status = build_status(conjur, outcomes, &now);

    if !status.differs_from(conjur.status.as_ref()) {
        debug!("status unchanged, skipping update");
        return;
    }

    if let Err(e) = ctx.kube.patch_status(namespace, name, &status).await {
        warn!(error = %e, "failed to update conjur status");
    }
}

fn build_status(
    conjur: &Conjur,
    outcomes: &BTreeMap<String, Result<(), String>>,
    now: &str,
) -> ConjurStatus {
    let previous = conjur.status.as_ref().map(|s| &s.secrets);

    let secrets: BTreeMap<String, SecretSyncStatus> = outcomes
        .iter()
        .map(|(name, outcome)| {
            let mut entry = SecretSyncStatus {
                synced: outcome.is_ok(),
                message: outcome.as_ref().err().cloned(),
                last_transition_time: now.to_string(),
            };
            if let Some(prev) = previous.and_then(|p| p.get(name)) {
                if prev.same_outcome(&entry) {
                    entry.last_transition_time = prev.last_transition_time.clone();
                }
            }
            (name.clone(), entry)
        })
        .collect();

    let synced_count = secrets.values().filter(|s| s.synced).count() as u32;
    let failed_count = secrets.len() as u32 - synced_count;

    ConjurStatus {
        observed_generation: conjur.metadata.generation,
        synced_count,
        failed_count,
        secrets,
    }
}

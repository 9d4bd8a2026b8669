//! Integration tests for CRD operations
//!
//! These tests tell the story of how application teams interact with Conjur
//! resources through the Kubernetes API.

use std::collections::BTreeMap;

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;

use conjur_operator::crd::{Conjur, ConjurStatus, SecretSyncStatus};

use super::helpers::{ensure_test_cluster, sample_conjur, TEST_NAMESPACE};

async fn cleanup_conjur(client: &Client, name: &str) {
    let api: Api<Conjur> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

// =============================================================================
// Resource Lifecycle Stories
// =============================================================================

/// Story: a team declares which Conjur variables their app needs
///
/// Expected behavior:
/// - The resource is accepted by the API server
/// - Wire names (conjurAcct, secretIdentifier, ...) round-trip unchanged
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_declares_secrets_to_sync() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Conjur> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "crd-create";
    cleanup_conjur(&client, name).await;

    let conjur = sample_conjur(name, &[("db-pass", "payments/db/password")]);
    let created = api
        .create(&PostParams::default(), &conjur)
        .await
        .expect("failed to create Conjur resource");

    assert_eq!(created.spec.conjur_account, "prod");
    assert_eq!(created.spec.refresh_interval, Some(120));
    assert_eq!(
        created.spec.data["db-pass"].secret_identifier,
        "payments/db/password"
    );

    let fetched = api.get(name).await.expect("failed to get Conjur resource");
    assert_eq!(fetched.spec, created.spec);

    cleanup_conjur(&client, name).await;
}

/// Story: a team adds a second entry to an existing resource
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_adds_an_entry() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Conjur> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "crd-update";
    cleanup_conjur(&client, name).await;

    let created = api
        .create(
            &PostParams::default(),
            &sample_conjur(name, &[("db-pass", "payments/db/password")]),
        )
        .await
        .expect("failed to create Conjur resource");

    let patch = serde_json::json!({
        "spec": { "data": { "api-token": { "secretIdentifier": "payments/api/token" } } }
    });
    let updated = api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("failed to patch Conjur resource");

    assert_eq!(updated.spec.data.len(), 2);
    assert!(updated.metadata.generation > created.metadata.generation);

    cleanup_conjur(&client, name).await;
}

/// Story: status written through the sub-resource does not touch the spec
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_is_a_subresource() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Conjur> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "crd-status";
    cleanup_conjur(&client, name).await;

    let created = api
        .create(
            &PostParams::default(),
            &sample_conjur(name, &[("db-pass", "payments/db/password")]),
        )
        .await
        .expect("failed to create Conjur resource");

    let status = ConjurStatus {
        observed_generation: created.metadata.generation,
        synced_count: 0,
        failed_count: 1,
        secrets: BTreeMap::from([(
            "db-pass".to_string(),
            SecretSyncStatus {
                synced: false,
                message: Some("conjur rejected the credentials".to_string()),
                last_transition_time: "2026-01-01T00:00:00+00:00".to_string(),
            },
        )]),
    };
    let patch = serde_json::json!({ "status": status });
    let patched = api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("failed to patch status");

    assert_eq!(patched.status, Some(status));
    assert_eq!(patched.metadata.generation, created.metadata.generation);

    cleanup_conjur(&client, name).await;
}

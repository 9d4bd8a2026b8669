//! Kubernetes API seam for the Conjur controller

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};

#[cfg(test)]
use mockall::automock;

use crate::crd::{Conjur, ConjurStatus};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting the Kubernetes operations the controller performs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. All operations are namespaced.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Read a Conjur resource, `None` if it does not exist
    async fn get_conjur(&self, namespace: &str, name: &str) -> Result<Option<Conjur>, Error>;

    /// Read a Secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a new Secret
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error>;

    /// Replace an existing Secret with the given object
    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error>;

    /// Server-side apply the status sub-resource of a Conjur resource
    ///
    /// Entries missing from `status.secrets` are dropped from the stored status.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ConjurStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_conjur(&self, namespace: &str, name: &str) -> Result<Option<Conjur>, Error> {
        let api: Api<Conjur> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error> {
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.secrets(namespace).create(&params, secret).await?;
        Ok(())
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal("cannot replace a secret without a name"))?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.secrets(namespace).replace(name, &params, secret).await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ConjurStatus,
    ) -> Result<(), Error> {
        let api: Api<Conjur> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "apiVersion": Conjur::api_version(&()),
            "kind": Conjur::kind(&()),
            "status": status
        });

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch_status(name, &params, &Patch::Apply(&patch)).await?;
        Ok(())
    }
}

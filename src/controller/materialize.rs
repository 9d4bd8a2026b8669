//! Writing fetched values into target Secrets

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::debug;

use super::KubeClient;
use crate::{Error, FIELD_MANAGER, MANAGED_BY_LABEL, SECRET_DATA_KEY};

/// Create `namespace/name` holding `value`, or overwrite its value if it exists
///
/// Returns `true` when the Secret was created. Only the `data` key is
/// written; other keys and metadata of an existing Secret are kept, and
/// Secrets are never deleted here.
pub async fn materialize(
    kube: &dyn KubeClient,
    namespace: &str,
    name: &str,
    value: &[u8],
) -> Result<bool, Error> {
    match kube.get_secret(namespace, name).await? {
        None => {
            let secret = build_secret(namespace, name, value);
            kube.create_secret(namespace, &secret).await?;
            debug!(%namespace, secret = %name, "created secret");
            Ok(true)
        }
        Some(mut existing) => {
            existing
                .data
                .get_or_insert_with(BTreeMap::new)
                .insert(SECRET_DATA_KEY.to_string(), ByteString(value.to_vec()));
            kube.replace_secret(namespace, &existing).await?;
            debug!(%namespace, secret = %name, "updated secret");
            Ok(false)
        }
    }
}

/// A new Opaque Secret whose `data` key holds `value`
pub fn build_secret(namespace: &str, name: &str, value: &[u8]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                FIELD_MANAGER.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            SECRET_DATA_KEY.to_string(),
            ByteString(value.to_vec()),
        )])),
        ..Default::default()
    }
}

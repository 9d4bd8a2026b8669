//! Controller for Conjur resources
//!
//! Each pass re-reads the resource, resolves the API key, then pulls and
//! materializes every declared entry independently. The only retry mechanism
//! is the next pass, scheduled through the returned requeue interval.

mod conjur;
mod credentials;
mod kube_client;
mod materialize;

pub use conjur::{error_policy, reconcile, reconcile_named, Context};
pub use credentials::resolve_api_key;
pub use kube_client::{KubeClient, KubeClientImpl};
pub use materialize::{build_secret, materialize};

#[cfg(test)]
pub use kube_client::MockKubeClient;

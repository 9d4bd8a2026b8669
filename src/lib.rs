//! Conjur operator - mirrors CyberArk Conjur variables into Kubernetes Secrets
//!
//! A `Conjur` custom resource names a Conjur server, the host identity to
//! authenticate as, a Secret holding that host's API key, and a map from
//! target Secret name to Conjur variable identifier. The controller keeps
//! one Secret per map entry whose `data` key holds the current variable value,
//! and re-runs on a fixed refresh interval.
//!
//! # Modules
//!
//! - [`crd`] - The `Conjur` custom resource and its status types
//! - [`vault`] - Conjur REST client (authenticate, fetch variable)
//! - [`controller`] - Reconciliation, secret materialization, credential lookup
//! - [`telemetry`] - Structured logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;
pub mod vault;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Minimum (and default) interval between two reconciliations of a resource
///
/// Declared refresh intervals below this value, absent, zero or negative all
/// resolve to this floor.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Field manager / managed-by value used for objects written by the operator
pub const FIELD_MANAGER: &str = "conjur-operator";

/// Key inside the credential Secret holding the base64-encoded Conjur API key
pub const API_KEY_FIELD: &str = "apikey";

/// Key inside each materialized Secret holding the fetched variable value
pub const SECRET_DATA_KEY: &str = "data";

/// Label marking Secrets created by this operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

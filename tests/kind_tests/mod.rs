//! Integration tests for the Conjur operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how application teams use Conjur resources to get Secrets.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading, updating, and deleting
//!   Conjur resources through the Kubernetes API
//!
//! - `secret_sync`: Stories about the reconciler writing Secrets and status
//!   against a real API server, with the Conjur side stubbed in-process
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod secret_sync;

//! Custom Resource Definitions for the Conjur operator

mod conjur;

pub use conjur::{
    refresh_interval, Conjur, ConjurSpec, ConjurStatus, SecretSyncStatus, SecretToPull,
};

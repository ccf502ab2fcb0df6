//! Reconciling deployment of Kubernetes resource manifests.
//!
//! The engine loads heterogeneous manifests from a workspace, dispatches
//! each resource to a kind-aware reconciler (create if absent, merge-patch
//! if present), and reports per-resource outcomes without aborting the
//! bundle on individual failures. It can additionally synthesize a
//! `kubernetes.io/dockerconfigjson` image-pull secret from resolved
//! registry credentials and attach it to a service account.
//!
//! The cluster is reached only through the [`client::ResourceClient`]
//! trait; the default implementation is backed by the [`kube`] crate.
//! Keeping the transport behind a trait lets tests drive the engine
//! against an in-memory cluster.

#![deny(missing_docs)]

pub mod client;
pub mod deploy;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod monitor;
pub mod pull_secret;
pub mod registry;
pub mod substitute;
pub mod yaml;

pub use error::Error;

/// Result type alias using the engine's error type.
pub type Result<T> = std::result::Result<T, Error>;

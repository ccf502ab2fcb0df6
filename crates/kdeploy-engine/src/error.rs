//! Error types for the deployment engine.
//!
//! The taxonomy mirrors how failures propagate: loading a bundle fails as
//! a whole ([`LoadError`]), while reconciling fails per resource
//! ([`ReconcileError`]) and is accumulated into the apply report instead
//! of aborting the bundle. Transport failures carry their HTTP status so
//! callers can distinguish not-found from conflict and validation errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::ManifestError;
use crate::yaml::YamlError;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest bundle failed to load; no API calls were made.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A single resource failed to reconcile.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A transport error outside any per-resource context.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A resource's kind has no registered reconciler.
    #[error("no reconciler registered for {api_version}/{kind} (resource {name})")]
    UnknownKind {
        /// The manifest's `apiVersion` value.
        api_version: String,
        /// The manifest's `kind` value.
        kind: String,
        /// The resource name, for context in logs.
        name: String,
    },

    /// A synthesized manifest was structurally invalid.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attaching a pull secret to a service account failed.
    #[error("failed to attach pull secret {secret} to service account {namespace}/{service_account}: {source}")]
    Attach {
        /// Namespace of the target service account.
        namespace: String,
        /// Name of the target service account.
        service_account: String,
        /// Name of the pull secret being attached.
        secret: String,
        /// The underlying transport failure.
        #[source]
        source: ClientError,
    },
}

/// Fatal errors raised while loading a manifest bundle.
///
/// Any of these aborts the whole bundle before a single API call is made.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A glob pattern could not be compiled.
    #[error("invalid manifest pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern as given.
        pattern: String,
        /// The glob library's description of the problem.
        message: String,
    },

    /// A pattern matched no files under any root.
    #[error("no manifests matched pattern '{pattern}'")]
    NoMatches {
        /// The pattern that found nothing.
        pattern: String,
    },

    /// A matched file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A file's content was not valid YAML or JSON.
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        /// Path of the unparseable file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: YamlError,
    },

    /// A document was parseable but not a usable Kubernetes manifest.
    #[error("invalid manifest in {path}: {source}")]
    Manifest {
        /// Path of the file containing the document.
        path: PathBuf,
        /// What was missing or malformed.
        #[source]
        source: ManifestError,
    },

    /// The same (kind, namespace, name) appeared more than once.
    #[error("duplicate resource {kind} {namespace}/{name} in bundle")]
    Duplicate {
        /// Kind of the duplicated resource.
        kind: String,
        /// Namespace, or the empty string for cluster-scoped resources.
        namespace: String,
        /// Name of the duplicated resource.
        name: String,
    },
}

/// Errors returned by a [`crate::client::ResourceClient`] implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An error returned by the kube client.
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error.
        #[from]
        source: kube::Error,
    },

    /// An API-style failure with an explicit status code.
    ///
    /// Used by non-kube implementations (the in-memory test cluster) so
    /// that status-based handling works identically across transports.
    #[error("api error ({code}): {message}")]
    Api {
        /// HTTP-style status code.
        code: u16,
        /// Human-readable description.
        message: String,
    },

    /// A resource payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Client construction failed before any request was made.
    #[error("kubeconfig error: {0}")]
    Config(String),
}

impl ClientError {
    /// The HTTP status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Kube {
                source: kube::Error::Api(e),
            } => Some(e.code),
            ClientError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this failure is a not-found response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether this failure is a write conflict.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// A per-resource reconcile failure.
///
/// Carries the (kind, namespace, name) triple so every failure names the
/// resource it belongs to. Accumulated by the dispatcher; never aborts
/// the remaining bundle.
#[derive(Debug)]
pub struct ReconcileError {
    /// Kind of the failed resource.
    pub kind: String,
    /// Namespace of the failed resource, `None` when cluster-scoped.
    pub namespace: Option<String>,
    /// Name of the failed resource.
    pub name: String,
    /// The underlying transport failure.
    pub source: ClientError,
}

impl ReconcileError {
    /// Wrap a transport failure with resource context.
    pub fn new(
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.map(str::to_owned),
            name: name.into(),
            source,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(
                f,
                "failed to reconcile {} {}/{}: {}",
                self.kind, ns, self.name, self.source
            ),
            None => write!(
                f,
                "failed to reconcile {} {}: {}",
                self.kind, self.name, self.source
            ),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_status_from_api_variant() {
        let err = ClientError::Api {
            code: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert!(!err.is_conflict());

        let err = ClientError::Api {
            code: 409,
            message: "conflict".to_string(),
        };
        assert!(err.is_conflict());
    }

    #[test]
    fn client_error_without_status() {
        let err = ClientError::Config("no kubeconfig".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn reconcile_error_names_the_resource() {
        let err = ReconcileError::new(
            "Deployment",
            Some("dev"),
            "app",
            ClientError::Api {
                code: 422,
                message: "field is immutable".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("Deployment"));
        assert!(msg.contains("dev/app"));
        assert!(msg.contains("immutable"));
    }

    #[test]
    fn reconcile_error_cluster_scoped_display() {
        let err = ReconcileError::new(
            "Namespace",
            None,
            "stage",
            ClientError::Api {
                code: 500,
                message: "boom".to_string(),
            },
        );
        assert!(err.to_string().contains("Namespace stage"));
        assert!(!err.to_string().contains("//"));
    }

    #[test]
    fn duplicate_load_error_message() {
        let err = LoadError::Duplicate {
            kind: "Service".to_string(),
            namespace: "dev".to_string(),
            name: "web".to_string(),
        };
        assert!(err.to_string().contains("duplicate resource Service dev/web"));
    }
}

//! The parsed resource model.
//!
//! A [`Resource`] is one Kubernetes manifest document with its identity
//! (group/version/kind, name, optional namespace) extracted up front.
//! It is immutable after parsing: the engine sends the payload to the
//! cluster exactly as written, and in particular never injects or
//! rewrites `metadata.namespace`.

use std::path::{Path, PathBuf};

use kube::api::GroupVersionKind;
use serde_json::Value;
use thiserror::Error;

/// Why a document could not become a [`Resource`].
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document was not a mapping.
    #[error("manifest document is not an object")]
    NotAnObject,

    /// A required field was absent or not a string.
    #[error("manifest is missing {0}")]
    MissingField(&'static str),
}

/// One parsed manifest document.
#[derive(Debug, Clone)]
pub struct Resource {
    gvk: GroupVersionKind,
    name: String,
    namespace: Option<String>,
    manifest: Value,
    source: Option<PathBuf>,
}

impl Resource {
    /// Parse a JSON document into a resource.
    ///
    /// Requires `apiVersion`, `kind`, and `metadata.name`;
    /// `metadata.namespace` is optional.
    pub fn from_value(manifest: Value) -> Result<Self, ManifestError> {
        if !manifest.is_object() {
            return Err(ManifestError::NotAnObject);
        }

        let api_version = manifest
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("apiVersion"))?;
        let kind = manifest
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("kind"))?;
        let name = manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("metadata.name"))?
            .to_string();
        let namespace = manifest
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let (group, version) = parse_api_version(api_version);
        let gvk = GroupVersionKind::gvk(group, version, kind);

        Ok(Self {
            gvk,
            name,
            namespace,
            manifest,
            source: None,
        })
    }

    /// Like [`Resource::from_value`], recording the file the document
    /// came from for logs and error context.
    pub fn from_value_in(manifest: Value, source: &Path) -> Result<Self, ManifestError> {
        let mut resource = Self::from_value(manifest)?;
        resource.source = Some(source.to_path_buf());
        Ok(resource)
    }

    /// The resource's group/version/kind.
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// The manifest's `kind` value.
    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    /// The manifest's `metadata.name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The manifest's `metadata.namespace`, if present.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The full manifest payload, exactly as parsed.
    pub fn manifest(&self) -> &Value {
        &self.manifest
    }

    /// The file this document was loaded from, when known.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Split an `apiVersion` string into `(group, version)`.
///
/// Core-group resources have no `/`, so `"v1"` becomes `("", "v1")`
/// while `"apps/v1"` becomes `("apps", "v1")`.
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

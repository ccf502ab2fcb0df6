//! Cluster transport.
//!
//! The engine issues exactly three operations per kind: GET by name,
//! CREATE, and merge-PATCH. [`ResourceClient`] captures that surface so
//! the reconcile logic is independent of the wire client, and tests can
//! substitute an in-memory cluster. The default implementation,
//! [`KubeResourceClient`], addresses every kind dynamically through
//! [`Api<DynamicObject>`] with the [`ApiResource`] derived from the
//! registry entry.
//!
//! [`ApiResource`]: kube::discovery::ApiResource

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;

use crate::error::ClientError;
use crate::registry::KindEntry;

/// Default connection timeout for kube clients.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// The typed-client surface the engine reconciles through.
///
/// `namespace` is `None` for cluster-scoped kinds and for namespaced
/// manifests that omit `metadata.namespace`; in the latter case the
/// implementation addresses the client's default namespace without
/// rewriting the payload.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a resource by name. Not-found is `Ok(None)`, never an error.
    async fn get(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClientError>;

    /// Create a resource from its manifest, returning the stored object.
    async fn create(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        manifest: &Value,
    ) -> Result<Value, ClientError>;

    /// Merge-patch an existing resource, returning the patched object.
    async fn patch(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value, ClientError>;
}

/// [`ResourceClient`] backed by the kube crate.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    /// Wrap an already-configured kube [`Client`].
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, entry: &KindEntry, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = entry.api_resource();
        if entry.is_cluster_scoped() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            match namespace {
                Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
                None => Api::default_namespaced_with(self.client.clone(), &ar),
            }
        }
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClientError> {
        match self.api(entry, namespace).get(name).await {
            Ok(obj) => Ok(Some(serde_json::to_value(&obj)?)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        manifest: &Value,
    ) -> Result<Value, ClientError> {
        let obj: DynamicObject = serde_json::from_value(manifest.clone())?;
        let created = self
            .api(entry, namespace)
            .create(&PostParams::default(), &obj)
            .await?;
        Ok(serde_json::to_value(&created)?)
    }

    async fn patch(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value, ClientError> {
        let patched = self
            .api(entry, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(serde_json::to_value(&patched)?)
    }
}

/// Create a kube client from an optional kubeconfig path.
///
/// An explicit path is read and parsed; otherwise configuration is
/// inferred from the environment (in-cluster service account or local
/// `~/.kube/config`). Both paths get bounded connect/read timeouts so a
/// dead API server fails the deploy instead of hanging it.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<KubeResourceClient, ClientError> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| ClientError::Config(format!("failed to read kubeconfig: {e}")))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ClientError::Config(format!("failed to load kubeconfig: {e}")))?
        }
        None => Config::infer()
            .await
            .map_err(|e| ClientError::Config(format!("failed to infer kube config: {e}")))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    let client = Client::try_from(config)?;
    Ok(KubeResourceClient::new(client))
}

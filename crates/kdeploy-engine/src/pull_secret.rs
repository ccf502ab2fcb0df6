//! Image-pull secret synthesis and attachment.
//!
//! Resolved registry credentials are folded into one docker-config JSON
//! payload, wrapped in a `kubernetes.io/dockerconfigjson` Secret, and
//! applied through the ordinary Secret reconciler so update events and
//! idempotence behave like any other resource. The payload is canonical:
//! registry URLs are map keys of a sorted map, so identical inputs
//! produce a byte-identical secret and a stable derived name across
//! runs, regardless of endpoint order.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::{LocalObjectReference, Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::deploy::Deployer;
use crate::error::{ClientError, Error};
use crate::manifest::Resource;
use crate::registry::SERVICE_ACCOUNT;

/// Default prefix for derived pull-secret names.
pub const DEFAULT_PULL_SECRET_PREFIX: &str = "registry-credentials";

/// Secret type for docker-config secrets.
pub const DOCKER_CONFIG_SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Data key under which the docker-config payload is stored.
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

/// A registry endpoint with resolved credentials.
///
/// Produced by the external credential resolver; the engine never reads
/// credential stores itself.
#[derive(Debug, Clone)]
pub struct RegistryEndpoint {
    /// Registry URL. A missing scheme is tolerated and normalized to
    /// `http://` with a warning.
    pub url: String,
    /// Registry user name.
    pub username: String,
    /// Registry password or token.
    pub password: String,
    /// Account email; serialized as the empty string when absent.
    pub email: Option<String>,
}

/// Location of an applied pull secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    /// Namespace the secret lives in.
    pub namespace: String,
    /// Name of the secret.
    pub name: String,
}

// Field order matters: it is part of the canonical payload.
#[derive(Debug, Serialize)]
struct DockerConfigEntry {
    username: String,
    password: String,
    email: String,
    auth: String,
}

/// Build the canonical docker-config JSON for a set of endpoints.
///
/// Entries are keyed by normalized registry URL in a sorted map and
/// `auth` is `base64(username:password)`, so the payload depends only on
/// the set of endpoints, not their order.
pub fn docker_config_json(endpoints: &[RegistryEndpoint]) -> Result<String, serde_json::Error> {
    let mut config: BTreeMap<String, DockerConfigEntry> = BTreeMap::new();
    for endpoint in endpoints {
        let url = normalize_registry_url(&endpoint.url);
        let auth = STANDARD.encode(format!("{}:{}", endpoint.username, endpoint.password));
        config.insert(
            url,
            DockerConfigEntry {
                username: endpoint.username.clone(),
                password: endpoint.password.clone(),
                email: endpoint.email.clone().unwrap_or_default(),
                auth,
            },
        );
    }
    serde_json::to_string(&config)
}

/// Prefix `http://` onto a registry URL that lacks a scheme.
///
/// Kept for compatibility with how the credentials were historically
/// entered; the rewrite is surfaced as a warning rather than silent.
pub fn normalize_registry_url(url: &str) -> String {
    if url.split_once("://").is_some() {
        url.to_string()
    } else {
        warn!(url = %url, "registry URL has no scheme, assuming http://");
        format!("http://{url}")
    }
}

/// Derive the stable pull-secret name for a canonical payload.
///
/// `<prefix>-<hash8>`, where `hash8` is the first 8 hex characters of
/// the SHA-256 digest of the payload. The name is an externally visible
/// property: downstream tooling may reference it, so it must not change
/// for identical inputs.
pub fn pull_secret_name(prefix: &str, payload: &str) -> String {
    use aws_lc_rs::digest;
    let hash = digest::digest(&digest::SHA256, payload.as_bytes());
    let hex = hash.as_ref()[..4]
        .iter()
        .fold(String::with_capacity(8), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        });
    format!("{prefix}-{hex}")
}

impl Deployer {
    /// Create or update the image-pull secret for `endpoints`.
    ///
    /// The secret is named `name` when given, otherwise
    /// `registry-credentials-<hash8>` derived from the payload. Applied
    /// via the Secret reconciler, so a re-run with identical inputs is a
    /// no-op patch and emits an update event rather than a create.
    pub async fn ensure_pull_secret(
        &self,
        namespace: &str,
        name: Option<&str>,
        endpoints: &[RegistryEndpoint],
    ) -> Result<SecretRef, Error> {
        let payload = docker_config_json(endpoints)?;
        let secret_name = match name {
            Some(explicit) => explicit.to_string(),
            None => pull_secret_name(DEFAULT_PULL_SECRET_PREFIX, &payload),
        };

        let mut data = BTreeMap::new();
        data.insert(
            DOCKER_CONFIG_KEY.to_string(),
            ByteString(payload.into_bytes()),
        );
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some(DOCKER_CONFIG_SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        };

        let resource = Resource::from_value(serde_json::to_value(&secret)?)?;
        self.reconcile(&resource).await?;

        info!(
            namespace = %namespace,
            secret = %secret_name,
            registries = endpoints.len(),
            "image-pull secret ensured"
        );
        Ok(SecretRef {
            namespace: namespace.to_string(),
            name: secret_name,
        })
    }

    /// Idempotently reference `secret_name` from a service account's
    /// `imagePullSecrets`.
    ///
    /// Returns `false` without writing (and without an event) when the
    /// reference already exists. A missing service account is an error;
    /// concurrent callers attaching the same secret may race but
    /// converge.
    pub async fn attach_pull_secret(
        &self,
        namespace: &str,
        service_account: &str,
        secret_name: &str,
    ) -> Result<bool, Error> {
        let attach_err = |source: ClientError| Error::Attach {
            namespace: namespace.to_string(),
            service_account: service_account.to_string(),
            secret: secret_name.to_string(),
            source,
        };

        let original = self
            .client()
            .get(&SERVICE_ACCOUNT, Some(namespace), service_account)
            .await
            .map_err(attach_err)?
            .ok_or_else(|| {
                attach_err(ClientError::Api {
                    code: 404,
                    message: "service account not found".to_string(),
                })
            })?;

        let account: ServiceAccount = serde_json::from_value(original.clone())?;
        let mut pull_secrets = account.image_pull_secrets.unwrap_or_default();
        if pull_secrets.iter().any(|r| r.name == secret_name) {
            debug!(
                namespace = %namespace,
                service_account = %service_account,
                secret = %secret_name,
                "pull secret already attached"
            );
            return Ok(false);
        }
        pull_secrets.push(LocalObjectReference {
            name: secret_name.to_string(),
        });

        let patch = serde_json::json!({ "imagePullSecrets": pull_secrets });
        let patched = self
            .client()
            .patch(&SERVICE_ACCOUNT, Some(namespace), service_account, &patch)
            .await
            .map_err(attach_err)?;
        self.monitor()
            .on_update(SERVICE_ACCOUNT.kind, Some(&original), &patched);

        info!(
            namespace = %namespace,
            service_account = %service_account,
            secret = %secret_name,
            "pull secret attached"
        );
        Ok(true)
    }
}

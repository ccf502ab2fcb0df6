//! Dispatch and reconciliation.
//!
//! [`Deployer`] routes each resource of a bundle through the registry to
//! the shared reconcile strategy: GET the current object by name, CREATE
//! it when absent, otherwise merge-PATCH the declared manifest onto it.
//! Per-resource failures are recorded and the rest of the bundle still
//! runs; there are no retries and no transaction semantics, so partial
//! application is observable in the cluster.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::ResourceClient;
use crate::error::{Error, ReconcileError};
use crate::loader::Bundle;
use crate::manifest::Resource;
use crate::monitor::{NoopMonitor, UpdateMonitor};
use crate::registry::{KindEntry, ReconcilerRegistry};

/// Which write a reconcile performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The resource did not exist and was created.
    Created,
    /// The resource existed and was patched.
    Updated,
}

/// The result of reconciling one resource.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Kind of the reconciled resource.
    pub kind: String,
    /// Namespace of the reconciled resource, `None` when cluster-scoped.
    pub namespace: Option<String>,
    /// Name of the reconciled resource.
    pub name: String,
    /// Whether the resource was created or updated.
    pub action: Action,
    /// The post-operation object as returned by the cluster.
    pub object: Value,
}

/// Aggregate result of applying a bundle.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Outcomes of the resources that reconciled successfully, in
    /// bundle order.
    pub outcomes: Vec<ReconcileOutcome>,
    /// Failures, also in bundle order; empty on full success.
    pub failures: Vec<ReconcileError>,
    /// Warnings carried over from loading plus any raised while
    /// dispatching (unknown kinds, cancellation).
    pub warnings: Vec<String>,
}

impl ApplyReport {
    /// Whether every resource in the bundle reconciled without error.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of resources that were created.
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == Action::Created)
            .count()
    }

    /// Number of resources that were updated.
    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == Action::Updated)
            .count()
    }
}

/// The manifest application engine.
///
/// Holds the transport, the immutable kind registry, and the event
/// monitor; no other state survives between calls, so one value can
/// serve concurrent `apply` invocations if the client is shareable.
pub struct Deployer {
    client: Arc<dyn ResourceClient>,
    registry: ReconcilerRegistry,
    monitor: Box<dyn UpdateMonitor>,
}

impl Deployer {
    /// Create a deployer with the no-op monitor.
    pub fn new(client: Arc<dyn ResourceClient>, registry: ReconcilerRegistry) -> Self {
        Self {
            client,
            registry,
            monitor: Box::new(NoopMonitor),
        }
    }

    /// Replace the event monitor.
    pub fn with_monitor(mut self, monitor: Box<dyn UpdateMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// The registry this deployer resolves kinds against.
    pub fn registry(&self) -> ReconcilerRegistry {
        self.registry
    }

    pub(crate) fn client(&self) -> &dyn ResourceClient {
        self.client.as_ref()
    }

    pub(crate) fn monitor(&self) -> &dyn UpdateMonitor {
        self.monitor.as_ref()
    }

    /// Apply a bundle, reconciling each resource in order.
    ///
    /// Failures are accumulated in the report; resources after a failed
    /// one are still attempted.
    pub async fn apply(&self, bundle: &Bundle) -> ApplyReport {
        self.run(bundle, None).await
    }

    /// Like [`Deployer::apply`], but stops between resources once
    /// `cancel` fires. The resource currently being reconciled completes
    /// or fails naturally; resources not yet attempted are neither
    /// outcomes nor failures.
    pub async fn apply_with_cancel(
        &self,
        bundle: &Bundle,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        self.run(bundle, Some(cancel)).await
    }

    async fn run(&self, bundle: &Bundle, cancel: Option<&CancellationToken>) -> ApplyReport {
        let mut report = ApplyReport {
            warnings: bundle.warnings().to_vec(),
            ..ApplyReport::default()
        };

        for resource in bundle.resources() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    let message = format!(
                        "apply cancelled before {} {}",
                        resource.kind(),
                        resource.name()
                    );
                    warn!("{message}");
                    report.warnings.push(message);
                    break;
                }
            }

            let Some(entry) = self.registry.lookup(resource.gvk()) else {
                // The loader already filters unknown kinds; this guards
                // bundles assembled directly by callers.
                let message = format!(
                    "skipping {} {}: no reconciler registered",
                    resource.kind(),
                    resource.name()
                );
                warn!("{message}");
                report.warnings.push(message);
                continue;
            };

            match self.reconcile_entry(entry, resource).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!(
                        kind = %e.kind,
                        name = %e.name,
                        namespace = e.namespace.as_deref().unwrap_or_default(),
                        error = %e.source,
                        "failed to reconcile resource, continuing with remaining bundle"
                    );
                    report.failures.push(e);
                }
            }
        }

        info!(
            total = bundle.resources().len(),
            created = report.created(),
            updated = report.updated(),
            failed = report.failures.len(),
            "bundle applied"
        );
        report
    }

    /// Reconcile a single resource: create it if absent, otherwise
    /// merge-patch the declared manifest onto the existing object.
    pub async fn reconcile(&self, resource: &Resource) -> Result<ReconcileOutcome, Error> {
        let entry = self
            .registry
            .lookup(resource.gvk())
            .ok_or_else(|| Error::UnknownKind {
                api_version: resource
                    .manifest()
                    .get("apiVersion")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: resource.kind().to_string(),
                name: resource.name().to_string(),
            })?;
        Ok(self.reconcile_entry(entry, resource).await?)
    }

    async fn reconcile_entry(
        &self,
        entry: &KindEntry,
        resource: &Resource,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // Namespace is ignored for cluster-scoped kinds; for namespaced
        // kinds the manifest's value is passed through untouched.
        let namespace = if entry.is_cluster_scoped() {
            None
        } else {
            resource.namespace()
        };
        let name = resource.name();
        let wrap = |source| ReconcileError::new(entry.kind, namespace, name, source);

        let existing = self
            .client
            .get(entry, namespace, name)
            .await
            .map_err(wrap)?;

        let outcome = match existing {
            None => {
                debug!(kind = %entry.kind, name = %name, "resource absent, creating");
                let created = self
                    .client
                    .create(entry, namespace, resource.manifest())
                    .await
                    .map_err(wrap)?;
                self.monitor.on_update(entry.kind, None, &created);
                ReconcileOutcome {
                    kind: entry.kind.to_string(),
                    namespace: namespace.map(str::to_owned),
                    name: name.to_string(),
                    action: Action::Created,
                    object: created,
                }
            }
            Some(original) => {
                debug!(kind = %entry.kind, name = %name, "resource exists, patching");
                let patched = self
                    .client
                    .patch(entry, namespace, name, resource.manifest())
                    .await
                    .map_err(wrap)?;
                self.monitor.on_update(entry.kind, Some(&original), &patched);
                ReconcileOutcome {
                    kind: entry.kind.to_string(),
                    namespace: namespace.map(str::to_owned),
                    name: name.to_string(),
                    action: Action::Updated,
                    object: patched,
                }
            }
        };
        Ok(outcome)
    }
}

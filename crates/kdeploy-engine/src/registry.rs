//! The reconciler registry.
//!
//! A fixed table of the resource kinds the engine knows how to
//! reconcile, keyed by group/version/kind. The registry is an explicit,
//! immutable value handed to the [`crate::deploy::Deployer`] rather than
//! process-global state; resolution happens against the parsed object's
//! concrete GVK, so `apps/v1` and `extensions/v1beta1` homes of the same
//! kind are distinct entries.

use kube::api::GroupVersionKind;
use kube::discovery::ApiResource;

/// Whether a kind lives in a namespace or at cluster scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Resources addressed as `/namespaces/{ns}/...`.
    Namespaced,
    /// Resources addressed without a namespace (e.g. Namespace itself).
    Cluster,
}

/// One supported kind: its API coordinates and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindEntry {
    /// API group; empty string for the core group.
    pub group: &'static str,
    /// API version within the group.
    pub version: &'static str,
    /// The kind name as it appears in manifests.
    pub kind: &'static str,
    plural: &'static str,
    scope: Scope,
}

impl KindEntry {
    const fn new(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
        scope: Scope,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
            scope,
        }
    }

    /// The full `apiVersion` string for this entry.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Whether this kind is cluster-scoped.
    pub fn is_cluster_scoped(&self) -> bool {
        self.scope == Scope::Cluster
    }

    /// Build the [`ApiResource`] used to address this kind dynamically.
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.to_string(),
            version: self.version.to_string(),
            api_version: self.api_version(),
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }
}

/// ServiceAccount coordinates for the pull-secret patcher.
///
/// Not part of the supported bundle kinds; service accounts are only
/// touched by [`crate::deploy::Deployer::attach_pull_secret`].
pub(crate) const SERVICE_ACCOUNT: KindEntry =
    KindEntry::new("", "v1", "ServiceAccount", "serviceaccounts", Scope::Namespaced);

// Both the legacy beta homes and the modern group/version homes of the
// workload kinds are registered, so old and new manifests apply
// unchanged.
const SUPPORTED: &[KindEntry] = &[
    KindEntry::new("", "v1", "Namespace", "namespaces", Scope::Cluster),
    KindEntry::new("", "v1", "Service", "services", Scope::Namespaced),
    KindEntry::new("", "v1", "Pod", "pods", Scope::Namespaced),
    KindEntry::new("", "v1", "ConfigMap", "configmaps", Scope::Namespaced),
    KindEntry::new("", "v1", "Secret", "secrets", Scope::Namespaced),
    KindEntry::new(
        "",
        "v1",
        "ReplicationController",
        "replicationcontrollers",
        Scope::Namespaced,
    ),
    KindEntry::new("apps", "v1", "Deployment", "deployments", Scope::Namespaced),
    KindEntry::new("apps", "v1", "DaemonSet", "daemonsets", Scope::Namespaced),
    KindEntry::new("apps", "v1", "StatefulSet", "statefulsets", Scope::Namespaced),
    KindEntry::new("apps", "v1", "ReplicaSet", "replicasets", Scope::Namespaced),
    KindEntry::new("batch", "v1", "Job", "jobs", Scope::Namespaced),
    KindEntry::new("batch", "v1", "CronJob", "cronjobs", Scope::Namespaced),
    KindEntry::new(
        "networking.k8s.io",
        "v1",
        "Ingress",
        "ingresses",
        Scope::Namespaced,
    ),
    KindEntry::new(
        "extensions",
        "v1beta1",
        "Ingress",
        "ingresses",
        Scope::Namespaced,
    ),
    KindEntry::new(
        "extensions",
        "v1beta1",
        "DaemonSet",
        "daemonsets",
        Scope::Namespaced,
    ),
    KindEntry::new(
        "extensions",
        "v1beta1",
        "ReplicaSet",
        "replicasets",
        Scope::Namespaced,
    ),
    KindEntry::new(
        "extensions",
        "v1beta1",
        "Deployment",
        "deployments",
        Scope::Namespaced,
    ),
    KindEntry::new("batch", "v1beta1", "CronJob", "cronjobs", Scope::Namespaced),
];

/// Immutable mapping from GVK to reconcilable kind.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerRegistry {
    entries: &'static [KindEntry],
}

impl ReconcilerRegistry {
    /// The built-in registry covering the supported kinds.
    pub fn builtin() -> Self {
        Self { entries: SUPPORTED }
    }

    /// Resolve a parsed GVK to its entry, if the kind is supported.
    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&'static KindEntry> {
        self.entries.iter().find(|e| {
            e.group == gvk.group && e.version == gvk.version && e.kind == gvk.kind
        })
    }

    /// All registered entries, in registration order.
    pub fn entries(&self) -> &'static [KindEntry] {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gvk(group: &str, version: &str, kind: &str) -> GroupVersionKind {
        GroupVersionKind::gvk(group, version, kind)
    }

    #[test]
    fn resolves_core_and_apps_kinds() {
        let registry = ReconcilerRegistry::builtin();

        let ns = registry.lookup(&gvk("", "v1", "Namespace")).unwrap();
        assert!(ns.is_cluster_scoped());

        let deploy = registry.lookup(&gvk("apps", "v1", "Deployment")).unwrap();
        assert!(!deploy.is_cluster_scoped());
        assert_eq!(deploy.api_version(), "apps/v1");
    }

    #[test]
    fn legacy_and_modern_homes_are_distinct_entries() {
        let registry = ReconcilerRegistry::builtin();

        let modern = registry.lookup(&gvk("apps", "v1", "Deployment")).unwrap();
        let legacy = registry
            .lookup(&gvk("extensions", "v1beta1", "Deployment"))
            .unwrap();
        assert_ne!(modern.api_version(), legacy.api_version());

        assert!(registry
            .lookup(&gvk("networking.k8s.io", "v1", "Ingress"))
            .is_some());
        assert!(registry
            .lookup(&gvk("batch", "v1beta1", "CronJob"))
            .is_some());
    }

    #[test]
    fn unknown_kinds_resolve_to_none() {
        let registry = ReconcilerRegistry::builtin();
        assert!(registry.lookup(&gvk("", "v1", "Node")).is_none());
        assert!(registry
            .lookup(&gvk("example.com", "v1", "Widget"))
            .is_none());
        // Wrong version of a known kind is unknown too.
        assert!(registry.lookup(&gvk("apps", "v1beta2", "Deployment")).is_none());
    }

    #[test]
    fn api_resource_carries_plural_and_api_version() {
        let registry = ReconcilerRegistry::builtin();
        let ingress = registry
            .lookup(&gvk("networking.k8s.io", "v1", "Ingress"))
            .unwrap();
        let ar = ingress.api_resource();
        assert_eq!(ar.plural, "ingresses");
        assert_eq!(ar.api_version, "networking.k8s.io/v1");
        assert_eq!(ar.kind, "Ingress");
    }

    #[test]
    fn registry_covers_the_full_supported_set() {
        assert_eq!(ReconcilerRegistry::builtin().entries().len(), 18);
    }

    #[test]
    fn service_account_entry_is_namespaced() {
        assert!(!SERVICE_ACCOUNT.is_cluster_scoped());
        assert_eq!(SERVICE_ACCOUNT.api_resource().plural, "serviceaccounts");
    }
}

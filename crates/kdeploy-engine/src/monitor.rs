//! Update events.
//!
//! Every successful reconcile emits one `(original, current)` event,
//! synchronously and in bundle order. The monitor is a single callback
//! over the kind tag rather than one method per kind; the default sink
//! discards events, and [`LoggingMonitor`] renders a small diff of the
//! fields operators actually look at.

use serde_json::Value;
use tracing::info;

/// Sink for reconcile events.
pub trait UpdateMonitor: Send + Sync {
    /// Called after each successful write.
    ///
    /// `original` is `None` when the resource was created, and the
    /// pre-patch object when it was updated. `current` is the
    /// post-operation object returned by the cluster.
    fn on_update(&self, kind: &str, original: Option<&Value>, current: &Value);
}

/// The default monitor: ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl UpdateMonitor for NoopMonitor {
    fn on_update(&self, _kind: &str, _original: Option<&Value>, _current: &Value) {}
}

/// Monitor that logs a compact diff for each event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMonitor;

impl UpdateMonitor for LoggingMonitor {
    fn on_update(&self, kind: &str, original: Option<&Value>, current: &Value) {
        let summary = ChangeSummary::diff(original, current);
        match original {
            None => info!(
                kind = %kind,
                name = %summary.name,
                namespace = summary.namespace.as_deref().unwrap_or_default(),
                replicas = summary.replicas,
                images = ?summary.images,
                "created resource"
            ),
            Some(_) => info!(
                kind = %kind,
                name = %summary.name,
                namespace = summary.namespace.as_deref().unwrap_or_default(),
                replicas = summary.replicas,
                previous_replicas = summary.previous_replicas,
                images = ?summary.images,
                previous_images = ?summary.previous_images,
                "updated resource"
            ),
        }
    }
}

/// What changed between the original and current object.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    /// `metadata.name` of the current object.
    pub name: String,
    /// `metadata.namespace` of the current object, if any.
    pub namespace: Option<String>,
    /// `spec.replicas` of the current object, if any.
    pub replicas: Option<i64>,
    /// `spec.replicas` of the original object, if any.
    pub previous_replicas: Option<i64>,
    /// Container images of the current object.
    pub images: Vec<String>,
    /// Container images of the original object.
    pub previous_images: Vec<String>,
}

impl ChangeSummary {
    /// Extract the diffable fields from an event pair.
    pub fn diff(original: Option<&Value>, current: &Value) -> Self {
        Self {
            name: current
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            namespace: current
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .map(str::to_owned),
            replicas: replicas(current),
            previous_replicas: original.and_then(replicas),
            images: images(current),
            previous_images: original.map(images).unwrap_or_default(),
        }
    }

    /// Whether the replica count differs between original and current.
    pub fn replicas_changed(&self) -> bool {
        self.previous_replicas != self.replicas
    }

    /// Whether any container image differs between original and current.
    pub fn images_changed(&self) -> bool {
        self.previous_images != self.images
    }
}

fn replicas(object: &Value) -> Option<i64> {
    object.pointer("/spec/replicas").and_then(Value::as_i64)
}

// Pods carry containers at /spec/containers, workload kinds under the
// pod template.
fn images(object: &Value) -> Vec<String> {
    let containers = object
        .pointer("/spec/template/spec/containers")
        .or_else(|| object.pointer("/spec/containers"))
        .and_then(Value::as_array);

    containers
        .map(|list| {
            list.iter()
                .filter_map(|c| c.get("image").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

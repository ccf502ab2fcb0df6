//! Shared test support: an in-memory cluster implementing the engine's
//! client trait, plus an event log monitor.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use kdeploy_engine::client::ResourceClient;
use kdeploy_engine::error::ClientError;
use kdeploy_engine::manifest::Resource;
use kdeploy_engine::monitor::UpdateMonitor;
use kdeploy_engine::registry::KindEntry;

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub verb: &'static str,
    pub kind: String,
    /// Exactly the namespace the engine passed, before any defaulting.
    pub namespace: Option<String>,
    pub name: String,
}

impl Op {
    pub fn is_write(&self) -> bool {
        self.verb != "get"
    }
}

#[derive(Default)]
struct Inner {
    /// Objects keyed by (kind, effective namespace, name).
    objects: BTreeMap<(String, String, String), Value>,
    ops: Vec<Op>,
    /// Injected failures keyed by (verb, resource name).
    failures: BTreeMap<(&'static str, String), (u16, String)>,
}

/// In-memory cluster with JSON-merge-patch semantics.
///
/// Namespaced objects without an explicit namespace land in `default`,
/// mirroring cluster admission. With `strict_namespaces` enabled,
/// creating a namespaced object outside `default` requires the Namespace
/// object to exist first.
#[derive(Default)]
pub struct FakeCluster {
    inner: Mutex<Inner>,
    strict_namespaces: bool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_namespaces() -> Self {
        Self {
            strict_namespaces: true,
            ..Self::default()
        }
    }

    /// Make the next and all following calls of `verb` for `name` fail.
    pub fn fail_with(&self, verb: &'static str, name: &str, code: u16, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert((verb, name.to_string()), (code, message.to_string()));
    }

    /// Put an object into the store without recording an op.
    pub fn seed(&self, kind: &str, namespace: Option<&str>, name: &str, object: Value) {
        self.inner.lock().unwrap().objects.insert(
            (
                kind.to_string(),
                namespace.unwrap_or("default").to_string(),
                name.to_string(),
            ),
            object,
        );
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn writes(&self) -> Vec<Op> {
        self.ops().into_iter().filter(Op::is_write).collect()
    }

    pub fn object(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&(
                kind.to_string(),
                namespace.unwrap_or("default").to_string(),
                name.to_string(),
            ))
            .cloned()
    }

    /// Snapshot of the whole store, for state-equality assertions.
    pub fn state(&self) -> BTreeMap<(String, String, String), Value> {
        self.inner.lock().unwrap().objects.clone()
    }

    fn effective_namespace(entry: &KindEntry, namespace: Option<&str>) -> String {
        if entry.is_cluster_scoped() {
            String::new()
        } else {
            namespace.unwrap_or("default").to_string()
        }
    }

    fn record(inner: &mut Inner, verb: &'static str, entry: &KindEntry, ns: Option<&str>, name: &str) {
        inner.ops.push(Op {
            verb,
            kind: entry.kind.to_string(),
            namespace: ns.map(str::to_owned),
            name: name.to_string(),
        });
    }

    fn injected_failure(inner: &Inner, verb: &'static str, name: &str) -> Option<ClientError> {
        inner
            .failures
            .get(&(verb, name.to_string()))
            .map(|(code, message)| ClientError::Api {
                code: *code,
                message: message.clone(),
            })
    }
}

#[async_trait]
impl ResourceClient for FakeCluster {
    async fn get(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, "get", entry, namespace, name);
        let key = (
            entry.kind.to_string(),
            Self::effective_namespace(entry, namespace),
            name.to_string(),
        );
        Ok(inner.objects.get(&key).cloned())
    }

    async fn create(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        manifest: &Value,
    ) -> Result<Value, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        let name = manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::record(&mut inner, "create", entry, namespace, &name);

        if let Some(err) = Self::injected_failure(&inner, "create", &name) {
            return Err(err);
        }

        let ns = Self::effective_namespace(entry, namespace);
        if self.strict_namespaces && !entry.is_cluster_scoped() && ns != "default" {
            let ns_key = ("Namespace".to_string(), String::new(), ns.clone());
            if !inner.objects.contains_key(&ns_key) {
                return Err(ClientError::Api {
                    code: 404,
                    message: format!("namespace '{ns}' not found"),
                });
            }
        }

        let key = (entry.kind.to_string(), ns, name);
        if inner.objects.contains_key(&key) {
            return Err(ClientError::Api {
                code: 409,
                message: "already exists".to_string(),
            });
        }
        inner.objects.insert(key, manifest.clone());
        Ok(manifest.clone())
    }

    async fn patch(
        &self,
        entry: &KindEntry,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value, ClientError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, "patch", entry, namespace, name);

        if let Some(err) = Self::injected_failure(&inner, "patch", name) {
            return Err(err);
        }

        let key = (
            entry.kind.to_string(),
            Self::effective_namespace(entry, namespace),
            name.to_string(),
        );
        let Some(existing) = inner.objects.get(&key) else {
            return Err(ClientError::Api {
                code: 404,
                message: "not found".to_string(),
            });
        };
        let merged = merge_values(existing, patch);
        inner.objects.insert(key, merged.clone());
        Ok(merged)
    }
}

/// JSON merge of `patch` onto `existing`: objects merge recursively,
/// nulls delete, everything else (including lists) replaces.
pub fn merge_values(existing: &Value, patch: &Value) -> Value {
    match (existing, patch) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                if value.is_null() {
                    merged.remove(key);
                } else {
                    let next = match merged.get(key) {
                        Some(current) => merge_values(current, value),
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

/// One observed update event.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: String,
    pub original: Option<Value>,
    pub current: Value,
}

impl Event {
    pub fn is_create(&self) -> bool {
        self.original.is_none()
    }
}

/// Cloneable event sink; clones share the same log.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl UpdateMonitor for EventLog {
    fn on_update(&self, kind: &str, original: Option<&Value>, current: &Value) {
        self.events.lock().unwrap().push(Event {
            kind: kind.to_string(),
            original: original.cloned(),
            current: current.clone(),
        });
    }
}

/// Parse a JSON manifest into a [`Resource`], panicking on bad fixtures.
pub fn resource(manifest: Value) -> Resource {
    Resource::from_value(manifest).expect("test manifest should be valid")
}

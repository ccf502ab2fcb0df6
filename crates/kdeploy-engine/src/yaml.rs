//! YAML parsing for manifest files.
//!
//! Manifests are parsed with yaml-rust2 and converted to
//! [`serde_json::Value`] so the rest of the engine deals with a single
//! document model regardless of whether the input was YAML or JSON.
//! Multi-document streams (separated by `---`) are preserved in order;
//! empty documents surface as `Value::Null` and are skipped by the
//! loader.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// Error raised when manifest text is not valid YAML.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct YamlError {
    message: String,
}

impl YamlError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    // The loader parses JSON files with serde_json but reports every
    // document syntax problem through the same error type.
    pub(crate) fn from_message(message: impl Into<String>) -> Self {
        Self::new(message)
    }
}

/// Parse a (possibly multi-document) YAML string into JSON values.
///
/// Documents keep their input order. An empty input yields an empty
/// vector; a document that is empty after comments yields `Value::Null`.
pub fn parse_documents(input: &str) -> Result<Vec<Value>, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError::new(e.to_string()))?;
    docs.into_iter().map(to_json).collect()
}

fn to_json(yaml: Yaml) -> Result<Value, YamlError> {
    let value = match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(raw) => {
            let parsed: f64 = raw
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError::new(e.to_string()))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json(item)?);
            }
            Value::Array(out)
        }
        Yaml::Hash(entries) => {
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key_to_string(key)?, to_json(value)?);
            }
            Value::Object(out)
        }
        Yaml::Alias(_) => return Err(YamlError::new("YAML aliases are not supported")),
        Yaml::BadValue => return Err(YamlError::new("bad YAML value")),
    };
    Ok(value)
}

// Kubernetes manifests only ever use string keys, but YAML permits
// scalars; render them instead of failing the whole document.
fn key_to_string(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(r) => Ok(r),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(YamlError::new("unsupported YAML key type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_deployment_manifest() {
        let yaml = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: dev
spec:
  replicas: 2
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.25
"#;
        let docs = parse_documents(yaml).unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc["kind"], "Deployment");
        assert_eq!(doc["metadata"]["namespace"], "dev");
        assert_eq!(doc["spec"]["replicas"], 2);
        assert_eq!(
            doc["spec"]["template"]["spec"]["containers"][0]["image"],
            "nginx:1.25"
        );
    }

    #[test]
    fn preserves_document_order() {
        let yaml = "kind: Namespace\n---\nkind: Service\n---\nkind: Deployment\n";
        let docs = parse_documents(yaml).unwrap();
        let kinds: Vec<_> = docs.iter().map(|d| d["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["Namespace", "Service", "Deployment"]);
    }

    #[test]
    fn empty_input_yields_no_documents() {
        assert!(parse_documents("").unwrap().is_empty());
    }

    #[test]
    fn blank_document_is_null() {
        let docs = parse_documents("kind: Pod\n---\n~\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[1].is_null());
    }

    #[test]
    fn booleans_and_numbers_convert() {
        let docs = parse_documents("enabled: true\nport: 8080\nratio: 0.5\n").unwrap();
        let doc = &docs[0];
        assert_eq!(doc["enabled"], true);
        assert_eq!(doc["port"], 8080);
        assert!((doc["ratio"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(parse_documents("kind: [unclosed").is_err());
    }

    #[test]
    fn integer_keys_are_rendered_as_strings() {
        let docs = parse_documents("8080: http\n").unwrap();
        assert_eq!(docs[0]["8080"], "http");
    }
}

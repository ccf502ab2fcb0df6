//! Manifest bundle loading.
//!
//! Resolves workspace-relative glob patterns to files, optionally runs
//! variable substitution over the raw text, splits multi-document
//! streams, and parses each document into a [`Resource`]. Document order
//! is preserved within a file, and files are visited in sorted path
//! order, so "Namespace before the workloads that use it" holds whenever
//! the bundle is written that way.
//!
//! Any parse failure is fatal for the whole bundle; unknown kinds are
//! skipped with a warning; a duplicate (kind, namespace, name) is fatal
//! because the engine writes each resource at most once per apply.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::manifest::Resource;
use crate::registry::ReconcilerRegistry;
use crate::substitute::substitute;
use crate::yaml;

/// Options controlling how manifest text is prepared.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Whether to run `${VAR}` substitution before parsing.
    pub substitute: bool,
    /// The substitution environment.
    pub env: BTreeMap<String, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            substitute: true,
            env: BTreeMap::new(),
        }
    }
}

/// An ordered set of resources ready to apply.
#[derive(Debug, Default)]
pub struct Bundle {
    resources: Vec<Resource>,
    warnings: Vec<String>,
}

impl Bundle {
    /// Build a bundle directly from parsed resources.
    ///
    /// Used by callers that synthesize resources instead of loading
    /// files; the same ordering guarantees apply.
    pub fn from_resources(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            warnings: Vec::new(),
        }
    }

    /// The resources, in apply order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Warnings accumulated while loading.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of resources in the bundle.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the bundle holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Load a bundle from glob patterns resolved against one or more roots.
pub fn load_bundle(
    roots: &[PathBuf],
    patterns: &[String],
    registry: &ReconcilerRegistry,
    options: &LoadOptions,
) -> Result<Bundle, LoadError> {
    let files = resolve_patterns(roots, patterns)?;

    let mut bundle = Bundle::default();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        let text = if options.substitute {
            let substituted = substitute(&text, &options.env);
            for variable in &substituted.missing {
                let message = format!(
                    "variable '{}' referenced in {} is not defined, leaving token as-is",
                    variable,
                    path.display()
                );
                warn!("{message}");
                bundle.warnings.push(message);
            }
            substituted.text
        } else {
            text
        };

        for document in parse_file(path, &text)? {
            // Documents that are empty after substitution are skipped
            // silently.
            if document.is_null() {
                continue;
            }

            let resource = Resource::from_value_in(document, path).map_err(|source| {
                LoadError::Manifest {
                    path: path.clone(),
                    source,
                }
            })?;

            if registry.lookup(resource.gvk()).is_none() {
                let message = format!(
                    "skipping unsupported kind {} for resource {} in {}",
                    resource.kind(),
                    resource.name(),
                    path.display()
                );
                warn!("{message}");
                bundle.warnings.push(message);
                continue;
            }

            let key = (
                resource.kind().to_string(),
                resource.namespace().unwrap_or_default().to_string(),
                resource.name().to_string(),
            );
            if !seen.insert(key) {
                return Err(LoadError::Duplicate {
                    kind: resource.kind().to_string(),
                    namespace: resource.namespace().unwrap_or_default().to_string(),
                    name: resource.name().to_string(),
                });
            }

            bundle.resources.push(resource);
        }
    }

    debug!(
        files = files.len(),
        resources = bundle.resources.len(),
        "loaded manifest bundle"
    );
    Ok(bundle)
}

/// Resolve every pattern against every root, returning the union of
/// matches in sorted path order. A pattern that matches nothing under
/// any root fails the load.
fn resolve_patterns(roots: &[PathBuf], patterns: &[String]) -> Result<Vec<PathBuf>, LoadError> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for pattern in patterns {
        let mut matched = 0usize;
        for root in roots {
            let full = root.join(pattern);
            let full = full.to_string_lossy();
            let entries = glob::glob(&full).map_err(|e| LoadError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            for entry in entries {
                let path = entry.map_err(|e| LoadError::Io {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                })?;
                if path.is_file() {
                    matched += 1;
                    files.insert(path);
                }
            }
        }
        if matched == 0 {
            return Err(LoadError::NoMatches {
                pattern: pattern.clone(),
            });
        }
    }

    Ok(files.into_iter().collect())
}

// JSON files hold a single document; everything else goes through the
// multi-document YAML parser.
fn parse_file(path: &Path, text: &str) -> Result<Vec<Value>, LoadError> {
    if text.trim_start().starts_with('{') {
        let value: Value = serde_json::from_str(text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            source: crate::yaml::YamlError::from_message(e.to_string()),
        })?;
        return Ok(vec![value]);
    }

    yaml::parse_documents(text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

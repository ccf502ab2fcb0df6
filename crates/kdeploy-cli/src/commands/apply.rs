//! The `apply` command: load a bundle, deploy it, and optionally
//! provision an image-pull secret for the configured registries.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::{error, info, warn};

use kdeploy_engine::client::create_client;
use kdeploy_engine::deploy::Deployer;
use kdeploy_engine::loader::{load_bundle, LoadOptions};
use kdeploy_engine::monitor::LoggingMonitor;
use kdeploy_engine::pull_secret::RegistryEndpoint;
use kdeploy_engine::registry::ReconcilerRegistry;

use crate::error::{Error, Result};

/// Arguments for `kdeploy apply`
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to a kubeconfig file (inferred from the environment when omitted)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Workspace root the config patterns resolve against (repeatable)
    #[arg(long, default_value = ".")]
    pub root: Vec<PathBuf>,

    /// Glob pattern selecting manifest files, e.g. 'k8s/**/*.yaml' (repeatable)
    #[arg(long = "configs", required = true)]
    pub configs: Vec<String>,

    /// Disable ${VAR} substitution in manifest files
    #[arg(long)]
    pub no_substitution: bool,

    /// Extra substitution variable, overriding the process environment (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Registry credential for the image-pull secret (repeatable)
    #[arg(long = "registry-credential", value_name = "URL=USER:PASSWORD")]
    pub registry_credentials: Vec<String>,

    /// Namespace for the synthesized image-pull secret
    #[arg(long, default_value = "default")]
    pub secret_namespace: String,

    /// Explicit name for the image-pull secret (derived from its content when omitted)
    #[arg(long)]
    pub secret_name: Option<String>,

    /// Service account the image-pull secret is attached to
    #[arg(long, default_value = "default")]
    pub service_account: String,
}

pub async fn run(args: ApplyArgs) -> Result<()> {
    let endpoints = parse_registry_credentials(&args.registry_credentials)?;

    let registry = ReconcilerRegistry::builtin();
    let options = LoadOptions {
        substitute: !args.no_substitution,
        env: substitution_env(&args.set)?,
    };
    let bundle = load_bundle(&args.root, &args.configs, &registry, &options)?;
    info!(resources = bundle.len(), "loaded manifest bundle");

    let client = create_client(args.kubeconfig.as_deref()).await?;
    let deployer =
        Deployer::new(Arc::new(client), registry).with_monitor(Box::new(LoggingMonitor));

    let report = deployer.apply(&bundle).await;
    for warning in &report.warnings {
        warn!("{warning}");
    }

    if !endpoints.is_empty() {
        let secret_ref = deployer
            .ensure_pull_secret(
                &args.secret_namespace,
                args.secret_name.as_deref(),
                &endpoints,
            )
            .await?;
        deployer
            .attach_pull_secret(&secret_ref.namespace, &args.service_account, &secret_ref.name)
            .await?;
    }

    if !report.is_success() {
        for failure in &report.failures {
            error!("{failure}");
        }
        return Err(Error::DeploymentFailed {
            failed: report.failures.len(),
            total: report.outcomes.len() + report.failures.len(),
        });
    }

    info!(
        created = report.created(),
        updated = report.updated(),
        "deployment finished"
    );
    Ok(())
}

/// The substitution environment: process env overlaid with --set pairs.
fn substitution_env(overrides: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    for pair in overrides {
        let (key, value) = pair.split_once('=').ok_or(Error::InvalidFlag {
            flag: "set",
            value: pair.clone(),
            expected: "KEY=VALUE",
        })?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

fn parse_registry_credentials(entries: &[String]) -> Result<Vec<RegistryEndpoint>> {
    let invalid = |value: &String| Error::InvalidFlag {
        flag: "registry-credential",
        value: value.clone(),
        expected: "URL=USER:PASSWORD",
    };

    let mut endpoints = Vec::with_capacity(entries.len());
    for entry in entries {
        let (url, credentials) = entry.split_once('=').ok_or_else(|| invalid(entry))?;
        let (username, password) = credentials.split_once(':').ok_or_else(|| invalid(entry))?;
        if url.is_empty() || username.is_empty() {
            return Err(invalid(entry));
        }
        endpoints.push(RegistryEndpoint {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            email: None,
        });
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_credentials() {
        let endpoints =
            parse_registry_credentials(&["https://r1.example.com=bot:hunter2".to_string()])
                .unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "https://r1.example.com");
        assert_eq!(endpoints[0].username, "bot");
        assert_eq!(endpoints[0].password, "hunter2");
    }

    #[test]
    fn password_may_contain_colons() {
        let endpoints = parse_registry_credentials(&["r=u:p:w:q".to_string()]).unwrap();
        assert_eq!(endpoints[0].password, "p:w:q");
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        assert!(parse_registry_credentials(&["no-separator".to_string()]).is_err());
        assert!(parse_registry_credentials(&["url=no-colon".to_string()]).is_err());
        assert!(parse_registry_credentials(&["=u:p".to_string()]).is_err());
    }

    #[test]
    fn set_overrides_win_over_process_env() {
        let env = substitution_env(&["KDEPLOY_TEST_TAG=v2".to_string()]).unwrap();
        assert_eq!(env.get("KDEPLOY_TEST_TAG").map(String::as_str), Some("v2"));
    }

    #[test]
    fn malformed_set_pairs_are_rejected() {
        assert!(substitution_env(&["NOEQUALS".to_string()]).is_err());
    }
}

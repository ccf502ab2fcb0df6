//! kdeploy CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// kdeploy - reconciling Kubernetes manifest deployment
#[derive(Parser, Debug)]
#[command(name = "kdeploy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a manifest bundle, optionally provisioning an image-pull secret
    Apply(commands::apply::ApplyArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Apply(args) => commands::apply::run(args).await,
        }
    }
}

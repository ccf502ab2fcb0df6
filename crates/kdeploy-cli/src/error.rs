//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] kdeploy_engine::Error),

    #[error("load error: {0}")]
    Load(#[from] kdeploy_engine::error::LoadError),

    #[error("client error: {0}")]
    Client(#[from] kdeploy_engine::error::ClientError),

    #[error("invalid value for --{flag}: '{value}' (expected {expected})")]
    InvalidFlag {
        flag: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{failed} of {total} resources failed to deploy")]
    DeploymentFailed { failed: usize, total: usize },
}

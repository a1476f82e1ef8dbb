//! Error types shared by the bootstrap phases

use crate::core::config::ConfigError;
use crate::core::provision::ProvisioningError;
use crate::core::publish::PublishError;
use crate::core::readiness::ReadinessError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while preparing local state or acquiring the registry server
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to reset {}: {source}", path.display())]
    Reset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry server configuration not found: {}", .0.display())]
    ServerConfigNotFound(PathBuf),

    #[error("Invalid registry server configuration {}: {message}", path.display())]
    ServerConfig { path: PathBuf, message: String },

    #[error("Failed to spawn registry server {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind registry server on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("The embedded registry cannot listen on {0}; use a TCP address")]
    UnsupportedListen(String),

    #[error("Registry server stopped before becoming ready: {0}")]
    ServerExited(String),

    #[error("Failed to stop registry server: {0}")]
    Shutdown(String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Top-level error of a bootstrap run
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Registry at {url} did not become ready within {timeout:?} ({attempts} probes)")]
    ReadinessTimeout {
        url: String,
        timeout: Duration,
        attempts: u32,
    },

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Publish(PublishError),

    #[error("Bootstrap cancelled")]
    Cancelled,
}

impl BootstrapError {
    /// Process exit code reported to the calling harness
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::Publish(PublishError::Failed { code, .. }) => *code,
            _ => 1,
        }
    }
}

impl From<ReadinessError> for BootstrapError {
    fn from(err: ReadinessError) -> Self {
        match err {
            ReadinessError::Timeout {
                url,
                timeout,
                attempts,
            } => BootstrapError::ReadinessTimeout {
                url,
                timeout,
                attempts,
            },
            ReadinessError::Client(message) => {
                BootstrapError::Setup(SetupError::HttpClient(message))
            }
            ReadinessError::Cancelled => BootstrapError::Cancelled,
        }
    }
}

impl From<PublishError> for BootstrapError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Cancelled => BootstrapError::Cancelled,
            other => BootstrapError::Publish(other),
        }
    }
}

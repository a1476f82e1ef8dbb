//! CLI-specific error types

use regboot::{BootstrapError, ConfigError, SetupError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

impl CliError {
    /// Exit code: a failed publish passes its command's code through
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Bootstrap(e) => e.exit_code(),
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use regboot::PublishError;
    use std::path::PathBuf;

    #[test]
    fn test_publish_failure_keeps_exit_code() {
        let err = CliError::from(BootstrapError::from(PublishError::Failed {
            package: PathBuf::from("/pkg"),
            code: 7,
        }));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_other_failures_exit_with_one() {
        let err = CliError::from(BootstrapError::Cancelled);
        assert_eq!(err.exit_code(), 1);
        let err = CliError::from(ConfigError::Invalid("bad".to_string()));
        assert_eq!(err.exit_code(), 1);
    }
}

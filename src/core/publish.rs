//! Package publication through an external package manager

use crate::core::config::PackagePublishSpec;
use crate::core::endpoint::RegistryEndpoint;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Publishing {} failed with exit code {code}", package.display())]
    Failed { package: PathBuf, code: i32 },

    #[error("Publishing {} did not finish within {timeout:?}", package.display())]
    Timeout { package: PathBuf, timeout: Duration },

    #[error("Publishing cancelled")]
    Cancelled,
}

/// One publish command, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub package: PathBuf,
}

impl PublishInvocation {
    pub fn new(
        package_manager: &str,
        spec: &PackagePublishSpec,
        endpoint: &RegistryEndpoint,
    ) -> Self {
        let args = vec![
            "--cwd".to_string(),
            spec.path.display().to_string(),
            "publish".to_string(),
            "--registry".to_string(),
            endpoint.as_str().to_string(),
            "--no-git-tag-version".to_string(),
            "--non-interactive".to_string(),
            "--ignore-scripts".to_string(),
            "--new-version".to_string(),
            spec.version.clone(),
        ];
        Self {
            program: package_manager.to_string(),
            args,
            package: spec.path.clone(),
        }
    }

    /// Human readable command line, for logs and error messages
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Runs publish commands; returns the exit code
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &PublishInvocation) -> std::io::Result<i32>;
}

/// Runs commands as child processes sharing this process's stdout and stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &PublishInvocation) -> std::io::Result<i32> {
        let status = TokioCommand::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await?;
        // Killed by a signal: no exit code
        Ok(status.code().unwrap_or(1))
    }
}

/// Publish `packages` in order, stopping at the first failure.
///
/// Each command gets `limit` to finish; an expired command is killed.
/// Packages published before a failure stay published.
pub async fn publish_all(
    runner: &dyn CommandRunner,
    package_manager: &str,
    packages: &[PackagePublishSpec],
    endpoint: &RegistryEndpoint,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<usize, PublishError> {
    for spec in packages {
        println!(
            "Publishing '{}' into the private NPM registry.",
            spec.display_name()
        );
        let invocation = PublishInvocation::new(package_manager, spec, endpoint);
        info!("Running: {}", invocation.command_line());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            result = timeout(limit, runner.run(&invocation)) => result,
        };
        let code = match result {
            Ok(Ok(code)) => code,
            Ok(Err(source)) => {
                return Err(PublishError::Spawn {
                    command: invocation.command_line(),
                    source,
                })
            }
            Err(_) => {
                return Err(PublishError::Timeout {
                    package: spec.path.clone(),
                    timeout: limit,
                })
            }
        };

        if code != 0 {
            return Err(PublishError::Failed {
                package: spec.path.clone(),
                code,
            });
        }
    }
    Ok(packages.len())
}

//! Run command implementation

use crate::cli::error::CliResult;
use clap::Args;
use regboot::{BootstrapConfig, RegistryBootstrapper, ServerStrategy};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the full bootstrap workflow
#[derive(Debug, Args)]
pub struct RunArgs {
    /// How to obtain the registry server
    #[arg(long, value_enum, help = "Registry server strategy")]
    pub strategy: Option<ServerStrategy>,

    /// Leave the registry running after a successful run
    #[arg(long, help = "Keep the registry running after publishing")]
    pub keep_running: bool,

    /// npmrc file receiving the auth token line
    #[arg(long, help = "Credential file to append the auth token to (default ~/.npmrc)")]
    pub credentials_file: Option<PathBuf>,

    /// Registry URL, when it differs from the server's listen address
    #[arg(long, help = "Registry URL used by clients")]
    pub registry_url: Option<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of file and environment settings
    pub fn apply(&self, config: &mut BootstrapConfig) {
        if let Some(strategy) = self.strategy {
            config.server.strategy = strategy;
        }
        if self.keep_running {
            config.keep_running = true;
        }
        if let Some(file) = &self.credentials_file {
            config.credentials_file = Some(file.clone());
        }
        if let Some(url) = &self.registry_url {
            config.registry_url = Some(url.clone());
        }
    }
}

pub async fn execute_run(config_path: Option<&Path>, args: RunArgs) -> CliResult<()> {
    let mut config = BootstrapConfig::load(config_path)?;
    args.apply(&mut config);
    let plan = config.resolve()?;
    info!(
        "Bootstrapping registry ({:?} server, {} package(s))",
        plan.strategy,
        plan.packages.len()
    );

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = RegistryBootstrapper::new(plan)
        .with_cancellation(cancel)
        .run()
        .await;
    interrupt.abort();

    let report = result?;
    println!(
        "🎉 Registry at {} is ready: user {} added, {} package(s) published.",
        report.endpoint, report.username, report.published
    );
    println!(
        "   Auth token written to {}",
        report.credentials_file.display()
    );
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupted, shutting down");
            cancel.cancel();
        }
        Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
    }
}

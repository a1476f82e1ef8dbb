//! Main CLI application structure

use clap::Parser;
use std::path::PathBuf;

use crate::cli::commands::{reset, run, serve, version, Commands};
use crate::cli::error::CliResult;

/// regboot - bootstrap a private npm registry for integration tests
#[derive(Debug, Parser)]
#[command(name = "regboot")]
#[command(version = regboot::VERSION)]
#[command(about = "Bootstrap a throwaway private npm registry and publish local packages to it")]
#[command(long_about = "regboot resets the registry state, starts a registry server, \
                         creates a throwaway user, writes its token to an npmrc file and \
                         publishes the configured packages.\n\n\
                         Settings come from regboot.toml (or --config) and REGBOOT_* \
                         environment variables, e.g. REGBOOT_SERVER__STRATEGY=embedded.\n\n\
                         Examples:\n\
                           regboot run                              # Full workflow\n\
                           regboot run --strategy embedded          # Use the in-process registry\n\
                           regboot reset                            # Only wipe storage and users\n\
                           regboot serve --port 4873                # Run the in-process registry")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the bootstrap configuration file
    #[arg(long, global = true, help = "Path to regboot.toml")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> CliResult<()> {
        regboot::init_logging(self.verbose);

        let config = self.config.as_deref();
        match self.command {
            Commands::Run(args) => run::execute_run(config, args).await,
            Commands::Reset(args) => reset::execute_reset(config, args).await,
            Commands::Serve(args) => serve::execute_serve(config, args).await,
            Commands::Version(args) => version::execute_version(args).await,
        }
    }
}

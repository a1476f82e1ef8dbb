//! Command modules for CLI

pub mod reset;
pub mod run;
pub mod serve;
pub mod version;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
#[command(about = "regboot commands")]
pub enum Commands {
    /// Reset state, start the registry, provision a user and publish packages
    #[command(about = "Run the full bootstrap workflow")]
    Run(run::RunArgs),

    /// Wipe registry storage and users
    #[command(about = "Reset registry storage and the users file")]
    Reset(reset::ResetArgs),

    /// Run the in-process registry until interrupted
    #[command(about = "Serve the embedded registry")]
    Serve(serve::ServeArgs),

    /// Display version information
    #[command(about = "Show version information")]
    Version(version::VersionArgs),
}

//! # regboot
//!
//! Brings up a throwaway private npm registry for integration testing and
//! seeds it with packages built from the local source tree.
//!
//! ## Architecture
//!
//! A run goes through fixed phases, each in its own module under [`core`]:
//! - State reset of the registry storage and its users file
//! - Server acquisition (an external registry process, or the in-process
//!   registry from [`http`])
//! - Readiness wait with a deadline
//! - Provisioning of a fresh user whose token is appended to an npmrc file
//! - Publication of each configured package, stopping at the first failure
//! - Teardown of the server, whether the run succeeded or not
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use regboot::{BootstrapConfig, RegistryBootstrapper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plan = BootstrapConfig::load(None)?.resolve()?;
//!     let report = RegistryBootstrapper::new(plan).run().await?;
//!
//!     println!("Registry seeded at {}", report.endpoint);
//!     println!("Published {} packages", report.published);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod http;

pub use core::bootstrap::{BootstrapReport, RegistryBootstrapper};
pub use core::config::{BootstrapConfig, ConfigError, PackagePublishSpec, RunPlan, ServerStrategy};
pub use core::credentials::{AuthToken, Credential, CredentialStore};
pub use core::endpoint::{ListenAddress, RegistryEndpoint};
pub use core::error::{BootstrapError, SetupError};
pub use core::provision::{ProvisioningError, UserProvisioner};
pub use core::publish::{CommandRunner, PublishError, PublishInvocation, SystemCommandRunner};
pub use core::readiness::{ReadinessMode, ReadinessPolicy};
pub use core::state::reset_state;
pub use http::{RegistryServer, RunningRegistry};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Version of regboot
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging (safe to call more than once)
pub fn init_logging(verbose: bool) {
    // Only initialize logging once
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;

        let default = if verbose { "regboot=debug" } else { "regboot=info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();

        // This will fail silently if already initialized
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
        assert!(!VERSION.is_empty());
    }
}

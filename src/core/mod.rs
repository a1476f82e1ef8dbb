//! Bootstrap phases and the types they share

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod provision;
pub mod publish;
pub mod readiness;
pub mod server;
pub mod server_config;
pub mod state;

// Re-export main types for convenience
pub use bootstrap::{BootstrapReport, RegistryBootstrapper};
pub use config::{BootstrapConfig, ConfigError, PackagePublishSpec, RunPlan, ServerStrategy};
pub use credentials::{AuthToken, Credential, CredentialStore};
pub use endpoint::{ListenAddress, RegistryEndpoint};
pub use error::{BootstrapError, SetupError};
pub use provision::{ProvisioningError, UserProvisioner};
pub use publish::{CommandRunner, PublishError, PublishInvocation, SystemCommandRunner};
pub use readiness::{ReadinessMode, ReadinessPolicy};
pub use server::ServerHandle;
pub use server_config::RegistryServerConfig;
pub use state::reset_state;

//! Bootstrap configuration
//!
//! Values come from `regboot.toml` (or the file passed with `--config`),
//! then `REGBOOT_`-prefixed environment variables, then CLI overrides.
//! [`BootstrapConfig::resolve`] turns the raw values into a [`RunPlan`] with
//! absolute paths and a validated endpoint.

use crate::core::endpoint::{EndpointError, ListenAddress, RegistryEndpoint};
use crate::core::error::BootstrapError;
use crate::core::readiness::{ReadinessMode, ReadinessPolicy};
use crate::core::server_config::RegistryServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "regboot.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid version '{version}' for package {}: {reason}", path.display())]
    InvalidVersion {
        path: PathBuf,
        version: String,
        reason: String,
    },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// How the registry server is obtained
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServerStrategy {
    /// Spawn the prebuilt registry binary as a child process
    #[default]
    External,
    /// Run the built-in registry inside this process
    Embedded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub strategy: ServerStrategy,
    /// Registry server binary; defaults to the locally installed verdaccio
    pub binary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub mode: ReadinessMode,
    pub timeout_secs: u64,
    pub interval_ms: u64,
    pub fixed_delay_secs: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::Probe,
            timeout_secs: 30,
            interval_ms: 500,
            fixed_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub timeout_secs: u64,
    /// Confirm the new token with `/-/whoami` after it is written
    pub verify_login: bool,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            verify_login: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Deadline for each publish command
    pub timeout_secs: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// One package to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePublishSpec {
    pub path: PathBuf,
    pub version: String,
}

impl PackagePublishSpec {
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// Directory name of the package, used in progress output
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        semver::Version::parse(&self.version).map_err(|e| ConfigError::InvalidVersion {
            path: self.path.clone(),
            version: self.version.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Raw bootstrap configuration as read from file and environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Registry URL clients use; derived from the listen address when unset
    pub registry_url: Option<String>,
    /// Registry server configuration file
    pub server_config: PathBuf,
    /// Overrides `storage` from the server configuration
    pub storage_dir: Option<PathBuf>,
    /// Overrides `auth.htpasswd.file` from the server configuration
    pub auth_file: Option<PathBuf>,
    /// Credential file receiving the auth token line; defaults to `~/.npmrc`
    pub credentials_file: Option<PathBuf>,
    pub package_manager: String,
    /// Leave the server running after a successful run
    pub keep_running: bool,
    pub server: ServerSettings,
    pub readiness: ReadinessSettings,
    pub provisioning: ProvisioningSettings,
    pub publish: PublishSettings,
    pub packages: Vec<PackagePublishSpec>,
    /// Directory relative paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            registry_url: None,
            server_config: PathBuf::from("verdaccio-config.yml"),
            storage_dir: None,
            auth_file: None,
            credentials_file: None,
            package_manager: "yarn".to_string(),
            keep_running: false,
            server: ServerSettings::default(),
            readiness: ReadinessSettings::default(),
            provisioning: ProvisioningSettings::default(),
            publish: PublishSettings::default(),
            packages: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration from `path`, or from `regboot.toml` in the working
    /// directory when it exists. Environment variables override file values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ConfigError::Invalid(format!("Failed to get current directory: {}", e))
        })?;

        let (file, required) = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                (absolutize(&current_dir, path), true)
            }
            None => (current_dir.join(DEFAULT_CONFIG_FILE), false),
        };

        let settings = config::Config::builder()
            .add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix("REGBOOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: BootstrapConfig = settings.try_deserialize()?;
        loaded.base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(current_dir);
        Ok(loaded)
    }

    /// Parse TOML text directly, anchoring relative paths at `base_dir`
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;
        let mut loaded: BootstrapConfig = settings.try_deserialize()?;
        loaded.base_dir = base_dir.to_path_buf();
        Ok(loaded)
    }

    /// Resolve paths, read the server configuration and validate everything
    pub fn resolve(&self) -> Result<RunPlan, BootstrapError> {
        let server_config_path = absolutize(&self.base_dir, &self.server_config);
        let server_config = RegistryServerConfig::load(&server_config_path)?;
        let listen = server_config.listen_address()?;

        let registry_url = match &self.registry_url {
            Some(url) => Some(RegistryEndpoint::parse(url).map_err(ConfigError::from)?),
            None => {
                // Fail before anything is started when no URL can be derived
                if let ListenAddress::Unix(path) = &listen {
                    return Err(ConfigError::from(EndpointError::SocketWithoutUrl(
                        path.clone(),
                    ))
                    .into());
                }
                None
            }
        };

        let storage_dir = match &self.storage_dir {
            Some(dir) => absolutize(&self.base_dir, dir),
            None => server_config
                .storage_dir()
                .unwrap_or_else(|| absolutize(&self.base_dir, Path::new(".storage"))),
        };
        let auth_file = match &self.auth_file {
            Some(file) => absolutize(&self.base_dir, file),
            None => server_config
                .auth_file()
                .unwrap_or_else(|| absolutize(&self.base_dir, Path::new("htpasswd"))),
        };
        let credentials_file = match &self.credentials_file {
            Some(file) => absolutize(&self.base_dir, file),
            None => default_credentials_file()?,
        };

        if self.package_manager.trim().is_empty() {
            return Err(invalid("package_manager must not be empty"));
        }
        if self.readiness.interval_ms == 0 {
            return Err(invalid("readiness.interval_ms must be positive"));
        }
        if self.publish.timeout_secs == 0 {
            return Err(invalid("publish.timeout_secs must be positive"));
        }

        let mut packages = Vec::with_capacity(self.packages.len());
        for spec in &self.packages {
            spec.validate()?;
            packages.push(PackagePublishSpec::new(
                absolutize(&self.base_dir, &spec.path),
                spec.version.clone(),
            ));
        }

        let server_binary = match &self.server.binary {
            Some(binary) => absolutize(&self.base_dir, binary),
            None => self.base_dir.join(default_server_binary()),
        };

        Ok(RunPlan {
            strategy: self.server.strategy,
            server_binary,
            server_config_path,
            listen,
            registry_url,
            storage_dir,
            auth_file,
            credentials_file,
            package_manager: self.package_manager.clone(),
            keep_running: self.keep_running,
            readiness: ReadinessPolicy {
                mode: self.readiness.mode,
                timeout: Duration::from_secs(self.readiness.timeout_secs),
                interval: Duration::from_millis(self.readiness.interval_ms),
                fixed_delay: Duration::from_secs(self.readiness.fixed_delay_secs),
            },
            provisioning_timeout: Duration::from_secs(self.provisioning.timeout_secs),
            verify_login: self.provisioning.verify_login,
            publish_timeout: Duration::from_secs(self.publish.timeout_secs),
            packages,
        })
    }
}

/// Fully resolved settings of one bootstrap run
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub strategy: ServerStrategy,
    pub server_binary: PathBuf,
    pub server_config_path: PathBuf,
    pub listen: ListenAddress,
    pub registry_url: Option<RegistryEndpoint>,
    pub storage_dir: PathBuf,
    pub auth_file: PathBuf,
    pub credentials_file: PathBuf,
    pub package_manager: String,
    pub keep_running: bool,
    pub readiness: ReadinessPolicy,
    pub provisioning_timeout: Duration,
    pub verify_login: bool,
    pub publish_timeout: Duration,
    pub packages: Vec<PackagePublishSpec>,
}

impl RunPlan {
    /// Endpoint for a server that ended up listening on `listen`
    pub fn endpoint_for(&self, listen: &ListenAddress) -> Result<RegistryEndpoint, ConfigError> {
        match &self.registry_url {
            Some(endpoint) => Ok(endpoint.clone()),
            None => Ok(RegistryEndpoint::from_listen_address(listen)?),
        }
    }
}

/// `~/.npmrc`
pub fn default_credentials_file() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".npmrc"))
        .ok_or_else(|| {
            ConfigError::Invalid(
                "Cannot determine the home directory; set credentials_file".to_string(),
            )
        })
}

/// Locally installed verdaccio launcher
pub fn default_server_binary() -> PathBuf {
    let name = if cfg!(windows) {
        "verdaccio.cmd"
    } else {
        "verdaccio"
    };
    Path::new("node_modules").join(".bin").join(name)
}

fn invalid(message: &str) -> BootstrapError {
    ConfigError::Invalid(message.to_string()).into()
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_server_config(dir: &Path, content: &str) {
        std::fs::write(dir.join("verdaccio-config.yml"), content).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = BootstrapConfig::default();
        assert_eq!(config.package_manager, "yarn");
        assert_eq!(config.server.strategy, ServerStrategy::External);
        assert_eq!(config.readiness.interval_ms, 500);
        assert_eq!(config.publish.timeout_secs, 300);
        assert!(config.provisioning.verify_login);
        assert!(!config.keep_running);
    }

    #[test]
    fn test_resolve_reads_server_config() {
        let temp_dir = TempDir::new().unwrap();
        write_server_config(
            temp_dir.path(),
            "storage: ./data\nauth:\n  htpasswd:\n    file: ./users\nlisten: 0.0.0.0:4999\n",
        );

        let config = BootstrapConfig::from_toml_str(
            r#"
credentials_file = "npmrc"

[[packages]]
path = "../my-private-package"
version = "1.0.0"
"#,
            temp_dir.path(),
        )
        .unwrap();

        let plan = config.resolve().unwrap();
        assert_eq!(plan.storage_dir, temp_dir.path().join("data"));
        assert_eq!(plan.auth_file, temp_dir.path().join("users"));
        assert_eq!(plan.credentials_file, temp_dir.path().join("npmrc"));
        assert_eq!(
            plan.listen,
            ListenAddress::Tcp {
                host: "0.0.0.0".to_string(),
                port: 4999
            }
        );
        assert_eq!(
            plan.endpoint_for(&plan.listen).unwrap().as_str(),
            "http://localhost:4999"
        );
        assert_eq!(
            plan.packages[0].path,
            temp_dir.path().join("../my-private-package")
        );
        assert_eq!(plan.packages[0].display_name(), "my-private-package");
    }

    #[test]
    fn test_explicit_registry_url_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_server_config(temp_dir.path(), "listen: unix:/tmp/registry.sock\n");

        let config = BootstrapConfig::from_toml_str(
            "registry_url = \"http://localhost:4873/\"\ncredentials_file = \"npmrc\"\n",
            temp_dir.path(),
        )
        .unwrap();
        let plan = config.resolve().unwrap();
        assert_eq!(
            plan.endpoint_for(&plan.listen).unwrap().as_str(),
            "http://localhost:4873"
        );
    }

    #[test]
    fn test_socket_listen_without_url_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_server_config(temp_dir.path(), "listen: unix:/tmp/registry.sock\n");

        let config =
            BootstrapConfig::from_toml_str("credentials_file = \"npmrc\"\n", temp_dir.path())
                .unwrap();
        assert!(matches!(
            config.resolve(),
            Err(BootstrapError::Config(ConfigError::Endpoint(
                EndpointError::SocketWithoutUrl(_)
            )))
        ));
    }

    #[test]
    fn test_invalid_package_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_server_config(temp_dir.path(), "");

        let config = BootstrapConfig::from_toml_str(
            "credentials_file = \"npmrc\"\n[[packages]]\npath = \"pkg\"\nversion = \"one\"\n",
            temp_dir.path(),
        )
        .unwrap();
        assert!(matches!(
            config.resolve(),
            Err(BootstrapError::Config(ConfigError::InvalidVersion { .. }))
        ));
    }

    #[test]
    fn test_missing_server_config_is_a_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            BootstrapConfig::from_toml_str("credentials_file = \"npmrc\"\n", temp_dir.path())
                .unwrap();
        assert!(matches!(config.resolve(), Err(BootstrapError::Setup(_))));
    }

    #[test]
    fn test_strategy_and_readiness_sections() {
        let config = BootstrapConfig::from_toml_str(
            r#"
package_manager = "npm"
keep_running = true

[server]
strategy = "embedded"

[readiness]
mode = "fixed-delay"
fixed_delay_secs = 2
"#,
            Path::new("/tmp"),
        )
        .unwrap();
        assert_eq!(config.server.strategy, ServerStrategy::Embedded);
        assert_eq!(config.readiness.mode, ReadinessMode::FixedDelay);
        assert_eq!(config.readiness.fixed_delay_secs, 2);
        assert_eq!(config.readiness.timeout_secs, 30);
        assert_eq!(config.package_manager, "npm");
        assert!(config.keep_running);
    }

    #[test]
    fn test_publish_timeout_section() {
        let temp_dir = TempDir::new().unwrap();
        write_server_config(temp_dir.path(), "");

        let config = BootstrapConfig::from_toml_str(
            "credentials_file = \"npmrc\"\n[publish]\ntimeout_secs = 45\n",
            temp_dir.path(),
        )
        .unwrap();
        let plan = config.resolve().unwrap();
        assert_eq!(plan.publish_timeout, Duration::from_secs(45));

        let config = BootstrapConfig::from_toml_str(
            "credentials_file = \"npmrc\"\n[publish]\ntimeout_secs = 0\n",
            temp_dir.path(),
        )
        .unwrap();
        assert!(matches!(
            config.resolve(),
            Err(BootstrapError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = BootstrapConfig::load(Some(Path::new("/no/such/regboot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}

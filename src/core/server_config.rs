//! Registry server configuration file (verdaccio-compatible YAML)
//!
//! Only the keys the bootstrapper needs are read: `listen`, `storage` and
//! `auth.htpasswd.file`. The file itself is handed to the external server
//! binary untouched.

use crate::core::endpoint::ListenAddress;
use crate::core::error::SetupError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// `listen` accepts a single address, a bare port or a list of addresses
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListenSetting {
    Port(u16),
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HtpasswdSection {
    #[serde(default)]
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuthSection {
    #[serde(default)]
    htpasswd: Option<HtpasswdSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawServerConfig {
    #[serde(default)]
    storage: Option<PathBuf>,
    #[serde(default)]
    listen: Option<ListenSetting>,
    #[serde(default)]
    auth: Option<AuthSection>,
}

/// Parsed registry server configuration
#[derive(Debug, Clone)]
pub struct RegistryServerConfig {
    path: PathBuf,
    raw: RawServerConfig,
}

impl RegistryServerConfig {
    /// Load the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        if !path.exists() {
            return Err(SetupError::ServerConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| SetupError::ServerConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(path, &content)
    }

    /// Parse configuration text; `path` anchors relative paths inside it
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self, SetupError> {
        // An empty document deserializes to unit, not to a mapping
        let raw = if content.trim().is_empty() {
            RawServerConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| SetupError::ServerConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        Ok(Self {
            path: path.to_path_buf(),
            raw,
        })
    }

    /// First configured listen address, or `localhost:4873`
    pub fn listen_address(&self) -> Result<ListenAddress, SetupError> {
        let first = match &self.raw.listen {
            None => return Ok(ListenAddress::default()),
            Some(ListenSetting::Port(port)) => port.to_string(),
            Some(ListenSetting::One(address)) => address.clone(),
            Some(ListenSetting::Many(addresses)) => match addresses.first() {
                Some(address) => address.clone(),
                None => return Ok(ListenAddress::default()),
            },
        };
        ListenAddress::parse(&first).map_err(|e| SetupError::ServerConfig {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Storage directory, resolved against the configuration file's directory
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.raw.storage.as_ref().map(|p| self.resolve(p))
    }

    /// htpasswd file of the file-based auth plugin, resolved like `storage_dir`
    pub fn auth_file(&self) -> Option<PathBuf> {
        self.raw
            .auth
            .as_ref()
            .and_then(|a| a.htpasswd.as_ref())
            .and_then(|h| h.file.as_ref())
            .map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.path.parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VERDACCIO_CONFIG: &str = r#"
storage: ./.storage
auth:
  htpasswd:
    file: ./htpasswd
    max_users: 1000
uplinks:
  npmjs:
    url: https://registry.npmjs.org/
packages:
  '@*/*':
    access: $all
    publish: $authenticated
  '**':
    access: $all
    publish: $authenticated
    proxy: npmjs
listen: 0.0.0.0:4873
logs:
  - { type: stdout, format: pretty, level: http }
"#;

    #[test]
    fn test_reads_relevant_keys() {
        let path = Path::new("/srv/publisher/verdaccio-config.yml");
        let config = RegistryServerConfig::from_yaml(path, VERDACCIO_CONFIG).unwrap();

        assert_eq!(
            config.storage_dir(),
            Some(PathBuf::from("/srv/publisher/./.storage"))
        );
        assert_eq!(
            config.auth_file(),
            Some(PathBuf::from("/srv/publisher/./htpasswd"))
        );
        assert_eq!(
            config.listen_address().unwrap(),
            ListenAddress::Tcp {
                host: "0.0.0.0".to_string(),
                port: 4873
            }
        );
    }

    #[test]
    fn test_listen_defaults_and_lists() {
        let path = Path::new("config.yml");
        let empty = RegistryServerConfig::from_yaml(path, "").unwrap();
        assert_eq!(empty.listen_address().unwrap(), ListenAddress::default());
        assert_eq!(empty.storage_dir(), None);
        assert_eq!(empty.auth_file(), None);

        let port_only = RegistryServerConfig::from_yaml(path, "listen: 5000\n").unwrap();
        assert_eq!(
            port_only.listen_address().unwrap(),
            ListenAddress::Tcp {
                host: "localhost".to_string(),
                port: 5000
            }
        );

        let list = RegistryServerConfig::from_yaml(
            path,
            "listen:\n  - unix:/tmp/verdaccio.sock\n  - localhost:4873\n",
        )
        .unwrap();
        assert_eq!(
            list.listen_address().unwrap(),
            ListenAddress::Unix(PathBuf::from("/tmp/verdaccio.sock"))
        );
    }

    #[test]
    fn test_invalid_yaml_is_a_setup_error() {
        let err =
            RegistryServerConfig::from_yaml(Path::new("c.yml"), "listen: [unclosed").unwrap_err();
        assert!(matches!(err, SetupError::ServerConfig { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = RegistryServerConfig::load(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, SetupError::ServerConfigNotFound(_)));
    }
}

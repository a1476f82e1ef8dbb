//! Registry endpoint and listen address types

use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Port the registry listens on when the configuration names none
pub const DEFAULT_PORT: u16 = 4873;

/// Endpoint and listen address errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported registry URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Registry URL must not carry a query or fragment: {0}")]
    QueryOrFragment(String),

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListen { address: String, reason: String },

    #[error("Cannot derive an HTTP registry URL from socket path {0}; set registry_url explicitly")]
    SocketWithoutUrl(PathBuf),
}

/// Base URL of a package registry.
///
/// The stored form never ends with a slash, so `join` can append paths without
/// producing `//` in the middle of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    scheme_len: usize,
    base: String,
}

impl RegistryEndpoint {
    /// Parse and normalize a registry URL
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| EndpointError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(EndpointError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(EndpointError::QueryOrFragment(raw.to_string()));
        }

        Ok(Self {
            scheme_len: url.scheme().len(),
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build the endpoint clients should use to reach a server on `address`
    pub fn from_listen_address(address: &ListenAddress) -> Result<Self, EndpointError> {
        match address {
            ListenAddress::Tcp { host, port } => {
                let host = match host.as_str() {
                    "" | "0.0.0.0" | "::" | "[::]" => "localhost",
                    other => other,
                };
                if host.contains(':') && !host.starts_with('[') {
                    Self::parse(&format!("http://[{}]:{}", host, port))
                } else {
                    Self::parse(&format!("http://{}:{}", host, port))
                }
            }
            ListenAddress::Unix(path) => Err(EndpointError::SocketWithoutUrl(path.clone())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Append a path to the base URL
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// URL of the registry root, used for readiness probes
    pub fn root_url(&self) -> String {
        format!("{}/", self.base)
    }

    /// CouchDB-style user document URL used to create users
    pub fn user_url(&self, name: &str) -> String {
        self.join(&format!("-/user/org.couchdb.user:{}", name))
    }

    pub fn whoami_url(&self) -> String {
        self.join("-/whoami")
    }

    /// Scheme-relative form (`//host:port/path`) that keys registry settings in `.npmrc`
    pub fn npmrc_key(&self) -> &str {
        &self.base[self.scheme_len + 1..]
    }

    /// The `.npmrc` line granting `token` access to this registry
    pub fn auth_token_line(&self, token: &str) -> String {
        format!("{}/:_authToken={}", self.npmrc_key(), token)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Address a registry server listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Default for ListenAddress {
    fn default() -> Self {
        ListenAddress::Tcp {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ListenAddress {
    /// Parse the listen forms registry servers accept:
    /// `4873`, `host:4873`, `http://host:4873/`, `[::1]:4873`, `unix:/path.sock`, `/path.sock`.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let raw = raw.trim();
        let invalid = |reason: &str| EndpointError::InvalidListen {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty address"));
        }
        if let Some(path) = raw.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(ListenAddress::Unix(PathBuf::from(path)));
        }
        if raw.starts_with('/') {
            return Ok(ListenAddress::Unix(PathBuf::from(raw)));
        }

        let rest = raw
            .strip_prefix("http://")
            .or_else(|| raw.strip_prefix("https://"))
            .unwrap_or(raw)
            .trim_end_matches('/');

        let parse_port = |port: &str| port.parse::<u16>().map_err(|_| invalid("bad port"));

        if rest.chars().all(|c| c.is_ascii_digit()) {
            return Ok(ListenAddress::Tcp {
                host: "localhost".to_string(),
                port: parse_port(rest)?,
            });
        }

        if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(invalid("unexpected text after IPv6 literal")),
            };
            return Ok(ListenAddress::Tcp {
                host: host.to_string(),
                port,
            });
        }

        match rest.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => Ok(ListenAddress::Tcp {
                host: host.to_string(),
                port: parse_port(port)?,
            }),
            Some(_) => Err(invalid("missing host")),
            None => Ok(ListenAddress::Tcp {
                host: rest.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }

    /// Same address with a different port; socket paths are returned unchanged
    pub fn with_port(&self, port: u16) -> Self {
        match self {
            ListenAddress::Tcp { host, .. } => ListenAddress::Tcp {
                host: host.clone(),
                port,
            },
            ListenAddress::Unix(path) => ListenAddress::Unix(path.clone()),
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp { host, port } if host.contains(':') => {
                write!(f, "[{}]:{}", host, port)
            }
            ListenAddress::Tcp { host, port } => write!(f, "{}:{}", host, port),
            ListenAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_normalized() {
        let endpoint = RegistryEndpoint::parse("http://localhost:4873/").unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:4873");
        assert_eq!(
            endpoint.user_url("u1"),
            "http://localhost:4873/-/user/org.couchdb.user:u1"
        );
        assert_eq!(endpoint.root_url(), "http://localhost:4873/");
    }

    #[test]
    fn test_path_prefix_is_kept() {
        let endpoint = RegistryEndpoint::parse("https://example.com/npm//").unwrap();
        assert_eq!(endpoint.as_str(), "https://example.com/npm");
        assert_eq!(endpoint.whoami_url(), "https://example.com/npm/-/whoami");
        assert_eq!(endpoint.npmrc_key(), "//example.com/npm");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            RegistryEndpoint::parse("ftp://localhost:4873"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            RegistryEndpoint::parse("http://localhost:4873/?x=1"),
            Err(EndpointError::QueryOrFragment(_))
        ));
        assert!(matches!(
            RegistryEndpoint::parse("not a url"),
            Err(EndpointError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_auth_token_line() {
        let endpoint = RegistryEndpoint::parse("http://localhost:4873").unwrap();
        assert_eq!(
            endpoint.auth_token_line("abc123"),
            "//localhost:4873/:_authToken=abc123"
        );
    }

    #[test]
    fn test_listen_address_forms() {
        assert_eq!(
            ListenAddress::parse("4873").unwrap(),
            ListenAddress::Tcp {
                host: "localhost".to_string(),
                port: 4873
            }
        );
        assert_eq!(
            ListenAddress::parse("0.0.0.0:5000").unwrap(),
            ListenAddress::Tcp {
                host: "0.0.0.0".to_string(),
                port: 5000
            }
        );
        assert_eq!(
            ListenAddress::parse("http://localhost:4873/").unwrap(),
            ListenAddress::Tcp {
                host: "localhost".to_string(),
                port: 4873
            }
        );
        assert_eq!(
            ListenAddress::parse("[::1]:4874").unwrap(),
            ListenAddress::Tcp {
                host: "::1".to_string(),
                port: 4874
            }
        );
        assert_eq!(
            ListenAddress::parse("unix:/tmp/registry.sock").unwrap(),
            ListenAddress::Unix(PathBuf::from("/tmp/registry.sock"))
        );
        assert!(ListenAddress::parse("localhost:99999").is_err());
        assert!(ListenAddress::parse(":4873").is_err());
    }

    #[test]
    fn test_endpoint_from_listen_address() {
        let any = ListenAddress::parse("0.0.0.0:4873").unwrap();
        assert_eq!(
            RegistryEndpoint::from_listen_address(&any).unwrap().as_str(),
            "http://localhost:4873"
        );

        let v6 = ListenAddress::parse("[::1]:4873").unwrap();
        assert_eq!(
            RegistryEndpoint::from_listen_address(&v6).unwrap().as_str(),
            "http://[::1]:4873"
        );
        assert_eq!(v6.to_string(), "[::1]:4873");

        let socket = ListenAddress::Unix(PathBuf::from("/tmp/r.sock"));
        assert!(matches!(
            RegistryEndpoint::from_listen_address(&socket),
            Err(EndpointError::SocketWithoutUrl(_))
        ));
    }
}

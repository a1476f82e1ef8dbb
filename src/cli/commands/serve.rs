//! Serve command implementation

use crate::cli::error::CliResult;
use clap::Args;
use regboot::{BootstrapConfig, ListenAddress, RegistryEndpoint, RegistryServer};
use std::path::Path;
use tracing::{info, warn};

/// Serve the embedded registry
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind the server to
    #[arg(long, help = "Host to bind the server to (default from the server config)")]
    pub host: Option<String>,

    /// Port to bind the server to
    #[arg(long, help = "Port to bind the server to (default from the server config)")]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Listen address with `--host`/`--port` applied over `configured`
    pub fn listen_address(&self, configured: &ListenAddress) -> ListenAddress {
        let (host, port) = match configured {
            ListenAddress::Tcp { host, port } => (host.clone(), *port),
            ListenAddress::Unix(_) => {
                ("localhost".to_string(), regboot::core::endpoint::DEFAULT_PORT)
            }
        };
        if self.host.is_none() && self.port.is_none() {
            return configured.clone();
        }
        ListenAddress::Tcp {
            host: self.host.clone().unwrap_or(host),
            port: self.port.unwrap_or(port),
        }
    }
}

pub async fn execute_serve(config_path: Option<&Path>, args: ServeArgs) -> CliResult<()> {
    let plan = BootstrapConfig::load(config_path)?.resolve()?;
    let listen = args.listen_address(&plan.listen);

    info!("Starting embedded registry on {}", listen);
    let mut running = RegistryServer::new(&plan.storage_dir, &plan.auth_file)?
        .start(&listen)
        .await?;

    let url = RegistryEndpoint::from_listen_address(running.listen_address())
        .map(|endpoint| endpoint.to_string())
        .unwrap_or_else(|_| running.listen_address().to_string());
    println!("regboot registry starting...");
    println!("  Listening on: {}", url);
    println!("  Storage:      {}", plan.storage_dir.display());

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Cannot listen for Ctrl-C: {}", e);
            }
        }
        reason = running.stopped() => warn!("{}", reason),
    }

    running.shutdown().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_address_is_default() {
        let args = ServeArgs {
            host: None,
            port: None,
        };
        let configured = ListenAddress::parse("0.0.0.0:4873").unwrap();
        assert_eq!(args.listen_address(&configured), configured);
    }

    #[test]
    fn test_port_override_keeps_host() {
        let args = ServeArgs {
            host: None,
            port: Some(5000),
        };
        let configured = ListenAddress::parse("0.0.0.0:4873").unwrap();
        assert_eq!(
            args.listen_address(&configured),
            ListenAddress::parse("0.0.0.0:5000").unwrap()
        );
    }

    #[test]
    fn test_socket_config_falls_back_to_tcp() {
        let args = ServeArgs {
            host: Some("127.0.0.1".to_string()),
            port: None,
        };
        let configured = ListenAddress::parse("unix:/tmp/registry.sock").unwrap();
        assert_eq!(
            args.listen_address(&configured),
            ListenAddress::parse("127.0.0.1:4873").unwrap()
        );
    }
}

//! Registry server acquisition and teardown

use crate::core::config::{RunPlan, ServerStrategy};
use crate::core::endpoint::ListenAddress;
use crate::core::error::SetupError;
use crate::http::{RegistryServer, RunningRegistry};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Registry server spawned as a child process
#[derive(Debug)]
pub struct ExternalServer {
    child: Child,
    listen: ListenAddress,
    binary: PathBuf,
}

/// A running registry owned by one bootstrap run
#[derive(Debug)]
pub enum ServerHandle {
    External(ExternalServer),
    Embedded(RunningRegistry),
}

/// Start the registry the way `plan` asks for
pub async fn acquire(plan: &RunPlan) -> Result<ServerHandle, SetupError> {
    match plan.strategy {
        ServerStrategy::External => {
            start_external(&plan.server_binary, &plan.server_config_path, &plan.listen)
        }
        ServerStrategy::Embedded => {
            start_embedded(&plan.storage_dir, &plan.auth_file, &plan.listen).await
        }
    }
}

/// Spawn `binary --config config_path` sharing this process's stdout and stderr
pub fn start_external(
    binary: &Path,
    config_path: &Path,
    listen: &ListenAddress,
) -> Result<ServerHandle, SetupError> {
    info!(
        "Starting registry server {} --config {}",
        binary.display(),
        config_path.display()
    );
    let child = Command::new(binary)
        .arg("--config")
        .arg(config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| SetupError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;
    info!("Registry server running as pid {:?}", child.id());

    Ok(ServerHandle::External(ExternalServer {
        child,
        listen: listen.clone(),
        binary: binary.to_path_buf(),
    }))
}

/// Start the in-process registry; resolves once the socket is listening
pub async fn start_embedded(
    storage_dir: &Path,
    auth_file: &Path,
    listen: &ListenAddress,
) -> Result<ServerHandle, SetupError> {
    info!("Starting embedded registry on {}", listen);
    let running = RegistryServer::new(storage_dir, auth_file)?
        .start(listen)
        .await?;
    Ok(ServerHandle::Embedded(running))
}

impl ServerHandle {
    /// Address the server is listening on
    pub fn listen_address(&self) -> &ListenAddress {
        match self {
            ServerHandle::External(server) => &server.listen,
            ServerHandle::Embedded(running) => running.listen_address(),
        }
    }

    /// Resolves only if the server stops on its own
    pub async fn stopped(&mut self) -> String {
        match self {
            ServerHandle::External(server) => match server.child.wait().await {
                Ok(status) => format!("{} exited with {}", server.binary.display(), status),
                Err(e) => format!("failed to wait for {}: {}", server.binary.display(), e),
            },
            ServerHandle::Embedded(running) => running.stopped().await,
        }
    }

    /// Stop the server and release its resources
    pub async fn shutdown(self) -> Result<(), SetupError> {
        match self {
            ServerHandle::External(mut server) => {
                if let Ok(Some(status)) = server.child.try_wait() {
                    info!("Registry server already exited with {}", status);
                    return Ok(());
                }
                info!("Stopping registry server {}", server.binary.display());
                server
                    .child
                    .start_kill()
                    .map_err(|e| SetupError::Shutdown(e.to_string()))?;
                let status = server
                    .child
                    .wait()
                    .await
                    .map_err(|e| SetupError::Shutdown(e.to_string()))?;
                info!("Registry server stopped ({})", status);
                Ok(())
            }
            ServerHandle::Embedded(running) => running.shutdown().await,
        }
    }

    /// Leave an external server running after this process exits.
    ///
    /// Embedded registries live inside this process and cannot be detached.
    pub fn detach(self) -> Option<RunningRegistry> {
        match self {
            ServerHandle::External(server) => {
                let ExternalServer { child, binary, .. } = server;
                warn!(
                    "Leaving registry server {} running (pid {:?})",
                    binary.display(),
                    child.id()
                );
                drop(child);
                None
            }
            ServerHandle::Embedded(running) => Some(running),
        }
    }
}

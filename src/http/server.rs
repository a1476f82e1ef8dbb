//! Axum HTTP server for the embedded registry

use crate::core::endpoint::ListenAddress;
use crate::core::error::SetupError;
use crate::http::handlers::{packages, status, users, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Publish documents carry base64 tarballs inline
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// In-process npm registry
pub struct RegistryServer {
    state: AppState,
}

impl RegistryServer {
    /// Create a registry storing packages in `storage_dir` and users in `auth_file`
    pub fn new(storage_dir: &Path, auth_file: &Path) -> Result<Self, SetupError> {
        let state = AppState::new(storage_dir, auth_file).map_err(|source| SetupError::Reset {
            path: auth_file.to_path_buf(),
            source,
        })?;
        Ok(Self { state })
    }

    /// Normalize hostnames for SocketAddr compatibility
    fn normalize_host(host: &str) -> &str {
        match host {
            // Convert localhost to 127.0.0.1 for dev machine compatibility
            "localhost" | "" => "127.0.0.1",
            "[::1]" => "::1",
            "[::]" => "::",
            _ => host,
        }
    }

    /// Create the Axum router with all routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(status::root))
            .route("/-/ping", get(status::ping))
            .route("/-/whoami", get(users::whoami))
            .route("/-/user/:user", put(users::add_user))
            .route(
                "/:package",
                get(packages::get_package).put(packages::publish_package),
            )
            .route("/:package/-/:file", get(packages::get_tarball))
            .route("/:package/:name/-/:file", get(packages::get_scoped_tarball))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
            )
            .with_state(self.state.clone())
    }

    /// Bind `listen` and serve in a background task.
    ///
    /// Returns once the socket is bound, so the registry accepts connections
    /// as soon as this resolves. Port 0 picks a free port; the handle reports
    /// the effective address.
    pub async fn start(self, listen: &ListenAddress) -> Result<RunningRegistry, SetupError> {
        let (host, port) = match listen {
            ListenAddress::Tcp { host, port } => (host.clone(), *port),
            ListenAddress::Unix(_) => {
                return Err(SetupError::UnsupportedListen(listen.to_string()))
            }
        };

        let bind_host = Self::normalize_host(&host);
        let listener = TcpListener::bind((bind_host, port))
            .await
            .map_err(|source| SetupError::Bind {
                address: listen.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| SetupError::Bind {
            address: listen.to_string(),
            source,
        })?;
        let address = listen.with_port(local_addr.port());
        info!("Embedded registry bound to {}", local_addr);

        let app = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(RunningRegistry {
            address,
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to a serving embedded registry
#[derive(Debug)]
pub struct RunningRegistry {
    address: ListenAddress,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl RunningRegistry {
    /// Effective listen address (configured host, bound port)
    pub fn listen_address(&self) -> &ListenAddress {
        &self.address
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves if the serving task ends on its own; describes why
    pub async fn stopped(&mut self) -> String {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let result = task.await;
        self.task = None;
        match result {
            Ok(Ok(())) => "embedded registry stopped".to_string(),
            Ok(Err(e)) => format!("embedded registry failed: {}", e),
            Err(e) => format!("embedded registry task aborted: {}", e),
        }
    }

    /// Stop accepting connections, drain in-flight requests and wait for the task
    pub async fn shutdown(mut self) -> Result<(), SetupError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let Some(task) = self.task.take() else {
            info!("Embedded registry already stopped");
            return Ok(());
        };
        match task.await {
            Ok(Ok(())) => {
                info!("Embedded registry on {} closed", self.local_addr);
                Ok(())
            }
            Ok(Err(e)) => Err(SetupError::Shutdown(e.to_string())),
            Err(e) => Err(SetupError::Shutdown(e.to_string())),
        }
    }
}

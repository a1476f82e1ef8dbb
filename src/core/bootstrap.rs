//! End-to-end bootstrap of a throwaway private registry

use crate::core::config::RunPlan;
use crate::core::credentials::{AuthToken, Credential, CredentialStore};
use crate::core::endpoint::RegistryEndpoint;
use crate::core::error::{BootstrapError, SetupError};
use crate::core::provision::UserProvisioner;
use crate::core::publish::{publish_all, CommandRunner, SystemCommandRunner};
use crate::core::readiness::{probe_client, wait_until_ready};
use crate::core::server::{self, ServerHandle};
use crate::core::state::reset_state;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub endpoint: RegistryEndpoint,
    pub username: String,
    pub token: AuthToken,
    pub published: usize,
    pub credentials_file: PathBuf,
}

/// Runs reset, server start, readiness, user provisioning and publication
/// in order, then tears the server down.
///
/// Once the server is started it is always stopped again, whichever phase
/// fails. Only a fully successful run with `keep_running` leaves it up.
pub struct RegistryBootstrapper {
    plan: RunPlan,
    runner: Arc<dyn CommandRunner>,
    cancel: CancellationToken,
}

impl RegistryBootstrapper {
    pub fn new(plan: RunPlan) -> Self {
        Self {
            plan,
            runner: Arc::new(SystemCommandRunner),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the runner used for publish commands
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Observe `cancel` in every blocking phase
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        reset_state(&self.plan.storage_dir, &self.plan.auth_file)?;

        if self.cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }

        let mut server = server::acquire(&self.plan).await?;
        info!("Registry server listening on {}", server.listen_address());

        match self.seed(&mut server).await {
            Ok(report) if self.plan.keep_running => {
                self.keep_alive(server, &report).await?;
                Ok(report)
            }
            Ok(report) => {
                server.shutdown().await?;
                Ok(report)
            }
            Err(e) => {
                error!("Bootstrap failed: {}", e);
                if let Err(teardown) = server.shutdown().await {
                    warn!("Teardown after failure also failed: {}", teardown);
                }
                Err(e)
            }
        }
    }

    /// Readiness, provisioning and publication against a started server
    async fn seed(&self, server: &mut ServerHandle) -> Result<BootstrapReport, BootstrapError> {
        let endpoint = self.plan.endpoint_for(server.listen_address())?;

        let client = probe_client()?;
        tokio::select! {
            ready = wait_until_ready(&client, &endpoint, &self.plan.readiness, &self.cancel) => {
                ready?;
            }
            reason = server.stopped() => {
                return Err(SetupError::ServerExited(reason).into());
            }
        }

        let credential = Credential::generate();
        let store = CredentialStore::new(&self.plan.credentials_file);
        let provisioner =
            UserProvisioner::new(self.plan.provisioning_timeout, self.plan.verify_login)?;
        let token = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(BootstrapError::Cancelled),
            token = provisioner.provision(&credential, &endpoint, &store) => token?,
        };

        let published = publish_all(
            self.runner.as_ref(),
            &self.plan.package_manager,
            &self.plan.packages,
            &endpoint,
            self.plan.publish_timeout,
            &self.cancel,
        )
        .await?;
        info!("Published {} package(s) to {}", published, endpoint);

        Ok(BootstrapReport {
            endpoint,
            username: credential.name,
            token,
            published,
            credentials_file: self.plan.credentials_file.clone(),
        })
    }

    /// Leave the registry up after a successful run
    async fn keep_alive(
        &self,
        server: ServerHandle,
        report: &BootstrapReport,
    ) -> Result<(), BootstrapError> {
        let Some(mut running) = server.detach() else {
            return Ok(());
        };

        println!(
            "Registry is running at {}. Press Ctrl-C to stop it.",
            report.endpoint
        );
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            reason = running.stopped() => warn!("{}", reason),
        }
        running.shutdown().await?;
        Ok(())
    }
}

//! Registry readiness wait

use crate::core::endpoint::RegistryEndpoint;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound for a single probe request
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("Registry at {url} did not become ready within {timeout:?} ({attempts} probes)")]
    Timeout {
        url: String,
        timeout: Duration,
        attempts: u32,
    },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Readiness wait cancelled")]
    Cancelled,
}

/// How readiness is established
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessMode {
    /// Poll `HEAD /` until it answers 2xx
    #[default]
    Probe,
    /// Sleep for a fixed time; does not confirm the server is up
    FixedDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub mode: ReadinessMode,
    pub timeout: Duration,
    pub interval: Duration,
    pub fixed_delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::Probe,
            timeout: Duration::from_secs(30),
            interval: Duration::from_millis(500),
            fixed_delay: Duration::from_secs(5),
        }
    }
}

/// Client used for readiness probes
pub fn probe_client() -> Result<Client, ReadinessError> {
    Client::builder()
        .user_agent(concat!("regboot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ReadinessError::Client(e.to_string()))
}

/// Single unauthenticated `HEAD /` probe; true on any 2xx answer
pub async fn probe(client: &Client, endpoint: &RegistryEndpoint, limit: Duration) -> bool {
    let request = client.head(endpoint.root_url()).timeout(limit).send();
    match request.await {
        Ok(response) => {
            debug!("Readiness probe answered {}", response.status());
            response.status().is_success()
        }
        Err(e) => {
            debug!("Readiness probe failed: {}", e);
            false
        }
    }
}

/// Wait until the registry answers probes, the deadline passes, or `cancel` fires.
///
/// Returns the number of probes sent (zero in fixed-delay mode).
pub async fn wait_until_ready(
    client: &Client,
    endpoint: &RegistryEndpoint,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> Result<u32, ReadinessError> {
    if policy.mode == ReadinessMode::FixedDelay {
        warn!(
            "Waiting {:?} instead of probing {}; the registry may still be starting afterwards",
            policy.fixed_delay, endpoint
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            _ = sleep(policy.fixed_delay) => return Ok(0),
        }
    }

    info!("Waiting for the registry at {} (timeout {:?})", endpoint, policy.timeout);
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let limit = remaining.min(PROBE_TIMEOUT).max(Duration::from_millis(1));

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            ready = timeout(limit, probe(client, endpoint, limit)) => ready.unwrap_or(false),
        };
        if ready {
            info!(
                "Registry ready after {:?} ({} probes)",
                started.elapsed(),
                attempts
            );
            return Ok(attempts);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ReadinessError::Timeout {
                url: endpoint.root_url(),
                timeout: policy.timeout,
                attempts,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            _ = sleep(policy.interval.min(deadline - now)) => {}
        }
    }
}

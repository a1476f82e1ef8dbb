//! Integration tests for the readiness wait

#![allow(clippy::all, clippy::unwrap_used, clippy::expect_used)]

use regboot::core::readiness::{probe_client, wait_until_ready, ReadinessError};
use regboot::{CancellationToken, ReadinessMode, ReadinessPolicy, RegistryEndpoint};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn policy(timeout_ms: u64) -> ReadinessPolicy {
    ReadinessPolicy {
        mode: ReadinessMode::Probe,
        timeout: Duration::from_millis(timeout_ms),
        interval: Duration::from_millis(20),
        fixed_delay: Duration::from_millis(0),
    }
}

#[tokio::test]
async fn test_ready_after_unavailable_answers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let endpoint = RegistryEndpoint::parse(&server.uri()).unwrap();
    let attempts = wait_until_ready(
        &probe_client().unwrap(),
        &endpoint,
        &policy(5_000),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_never_ready_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let endpoint = RegistryEndpoint::parse(&server.uri()).unwrap();
    let started = Instant::now();
    let err = wait_until_ready(
        &probe_client().unwrap(),
        &endpoint,
        &policy(200),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        ReadinessError::Timeout { url, attempts, .. } => {
            assert_eq!(url, format!("{}/", server.uri()));
            assert!(attempts >= 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancellation_stops_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let endpoint = RegistryEndpoint::parse(&server.uri()).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = wait_until_ready(&probe_client().unwrap(), &endpoint, &policy(30_000), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReadinessError::Cancelled));
}

#[tokio::test]
async fn test_fixed_delay_sends_no_probes() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let endpoint = RegistryEndpoint::parse(&server.uri()).unwrap();
    let policy = ReadinessPolicy {
        mode: ReadinessMode::FixedDelay,
        fixed_delay: Duration::from_millis(50),
        ..policy(1_000)
    };
    let attempts = wait_until_ready(
        &probe_client().unwrap(),
        &endpoint,
        &policy,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(attempts, 0);
}

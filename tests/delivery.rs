mod common;

use std::time::{Duration, Instant};

use common::{dead_endpoint, fast_config, StatusEndpoint};
use iot_temp_sim::delivery::DeliveryEngine;
use iot_temp_sim::generator;
use iot_temp_sim::models::DeliveryOutcome;

#[tokio::test]
async fn first_2xx_delivers_after_one_request() {
    let endpoint = StatusEndpoint::start(200);
    let config = fast_config(&endpoint.url);
    let engine = DeliveryEngine::new(&config);

    let outcome = engine.deliver(&generator::generate(&config)).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert_eq!(endpoint.hit_count(), 1);
    assert_eq!(
        endpoint.header("user-agent").as_deref(),
        Some("IoT-Device/device-test")
    );
    assert_eq!(
        endpoint.header("content-type").as_deref(),
        Some("application/json")
    );
}

#[tokio::test]
async fn persistent_5xx_exhausts_the_retry_budget() {
    let endpoint = StatusEndpoint::start(503);
    let config = fast_config(&endpoint.url);
    let engine = DeliveryEngine::new(&config);

    let started = Instant::now();
    let outcome = engine.deliver(&generator::generate(&config)).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, DeliveryOutcome::RetryableFailure);
    assert_eq!(endpoint.hit_count(), config.max_retries as usize);
    // max_retries - 1 inter-attempt delays
    let expected_delay = config.retry_delay * (config.max_retries - 1);
    assert!(
        elapsed >= expected_delay,
        "expected at least {:?} of retry delays, saw {:?}",
        expected_delay,
        elapsed
    );
}

#[tokio::test]
async fn client_rejection_aborts_without_retrying() {
    let endpoint = StatusEndpoint::start(404);
    let config = fast_config(&endpoint.url);
    let engine = DeliveryEngine::new(&config);

    let outcome = engine.deliver(&generator::generate(&config)).await;

    assert_eq!(outcome, DeliveryOutcome::PermanentFailure);
    assert_eq!(endpoint.hit_count(), 1);
}

#[tokio::test]
async fn connection_refused_is_retried_then_reported_retryable() {
    let config = fast_config(&dead_endpoint());
    let engine = DeliveryEngine::new(&config);

    let started = Instant::now();
    let outcome = engine.deliver(&generator::generate(&config)).await;

    assert_eq!(outcome, DeliveryOutcome::RetryableFailure);
    assert!(started.elapsed() >= config.retry_delay * (config.max_retries - 1));
}

#[tokio::test]
async fn single_retry_budget_means_no_delay() {
    let endpoint = StatusEndpoint::start(500);
    let mut config = fast_config(&endpoint.url);
    config.max_retries = 1;
    config.retry_delay = Duration::from_secs(60);
    let engine = DeliveryEngine::new(&config);

    let started = Instant::now();
    let outcome = engine.deliver(&generator::generate(&config)).await;

    assert_eq!(outcome, DeliveryOutcome::RetryableFailure);
    assert_eq!(endpoint.hit_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

use log::{error, info, warn};
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;

use crate::config::DeviceConfig;
use crate::models::{DeliveryOutcome, Reading};

/// Decision for a single attempt, derived from one HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Success,
    Retry,
    Abort,
}

/// Owns the reusable outbound HTTP agent and the retry policy.
///
/// The agent is created once per device instance and keeps connections
/// alive across attempts and cycles; dropping the engine releases it.
pub struct DeliveryEngine {
    agent: ureq::Agent,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl DeliveryEngine {
    pub fn new(config: &DeviceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .user_agent(&format!("IoT-Device/{}", config.device_id))
            .build();

        DeliveryEngine {
            agent,
            endpoint: config.webhook_url.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        }
    }

    /// Attempt to deliver one reading, up to `max_retries` times.
    ///
    /// Connection failures, timeouts and 5xx responses are retried after
    /// `retry_delay`; a 4xx rejection abandons the reading immediately.
    /// Failures never escape this boundary, they resolve to an outcome.
    pub async fn deliver(&self, reading: &Reading) -> DeliveryOutcome {
        let body = match serde_json::to_string(reading) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode reading, dropping it: {}", e);
                return DeliveryOutcome::PermanentFailure;
            }
        };

        for attempt in 1..=self.max_retries {
            let agent = self.agent.clone();
            let endpoint = self.endpoint.clone();
            let payload = body.clone();
            let exchange = task::spawn_blocking(move || {
                agent
                    .post(&endpoint)
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            })
            .await;

            let step = match exchange {
                Ok(result) => classify_exchange(attempt, self.max_retries, result),
                Err(e) => {
                    error!(
                        "Delivery worker failed (attempt {}/{}): {}",
                        attempt, self.max_retries, e
                    );
                    Attempt::Retry
                }
            };

            match step {
                Attempt::Success => {
                    info!("Reading delivered: {:.2}°C", reading.temperature);
                    return DeliveryOutcome::Delivered;
                }
                Attempt::Abort => return DeliveryOutcome::PermanentFailure,
                Attempt::Retry => {
                    if attempt < self.max_retries {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        error!("All {} delivery attempts exhausted", self.max_retries);
        DeliveryOutcome::RetryableFailure
    }
}

/// Map one transport result onto an attempt decision, logging it.
fn classify_exchange(
    attempt: u32,
    max_retries: u32,
    result: Result<ureq::Response, ureq::Error>,
) -> Attempt {
    match result {
        Ok(response) => {
            let step = classify_status(response.status());
            if step != Attempt::Success {
                warn!(
                    "Unexpected HTTP {} (attempt {}/{})",
                    response.status(),
                    attempt,
                    max_retries
                );
            }
            step
        }
        Err(ureq::Error::Status(code, _)) => {
            let step = classify_status(code);
            match step {
                Attempt::Abort => error!("Endpoint rejected reading: HTTP {}", code),
                _ => warn!("HTTP {} (attempt {}/{})", code, attempt, max_retries),
            }
            step
        }
        Err(ureq::Error::Transport(e)) => {
            warn!(
                "Connection failed (attempt {}/{}): {}",
                attempt, max_retries, e
            );
            Attempt::Retry
        }
    }
}

/// Status-class policy: 2xx succeeds, 4xx aborts the whole attempt
/// sequence, everything else (5xx, stray 3xx) is retryable.
pub(crate) fn classify_status(status: u16) -> Attempt {
    match status {
        200..=299 => Attempt::Success,
        400..=499 => Attempt::Abort,
        _ => Attempt::Retry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_are_delivered() {
        for status in [200, 201, 204, 299] {
            assert_eq!(classify_status(status), Attempt::Success);
        }
    }

    #[test]
    fn client_rejections_abort() {
        for status in [400, 404, 422, 499] {
            assert_eq!(classify_status(status), Attempt::Abort);
        }
    }

    #[test]
    fn server_errors_and_stray_statuses_retry() {
        for status in [304, 500, 502, 503, 599] {
            assert_eq!(classify_status(status), Attempt::Retry);
        }
    }
}

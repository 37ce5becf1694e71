use futures_util::FutureExt;
use log::{error, info, warn};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::config::DeviceConfig;
use crate::delivery::DeliveryEngine;
use crate::generator;
use crate::models::DeliveryOutcome;

/// Backoff after a panicking iteration, deliberately shorter than the
/// configured cooldown.
const ERROR_BACKOFF_SECS: u64 = 10;

/// Supervisor states. `Stopped` is only reached through the shutdown
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Running,
    CoolingDown,
    Stopped,
}

/// Consecutive-failure accounting owned by the supervisor loop.
#[derive(Debug)]
pub struct FailureTracker {
    consecutive: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        FailureTracker {
            consecutive: 0,
            threshold,
        }
    }

    /// Fold one outcome into the counter and decide the next state.
    /// Any non-Delivered outcome counts as a single miss.
    pub fn record(&mut self, outcome: DeliveryOutcome) -> DeviceState {
        match outcome {
            DeliveryOutcome::Delivered => self.consecutive = 0,
            _ => self.consecutive += 1,
        }
        if self.consecutive >= self.threshold {
            DeviceState::CoolingDown
        } else {
            DeviceState::Running
        }
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Run the device until the shutdown channel fires.
///
/// Sequential cycles: generate a reading, deliver it, account for the
/// outcome, sleep the interval. Sustained failure triggers an extended
/// cooldown; a panicking iteration is caught, logged and followed by a
/// short backoff. Every sleep is raced against the shutdown signal so
/// cancellation takes effect within one sleep-granularity unit, and the
/// outbound agent is released on every exit path when the engine drops.
pub async fn run_device(config: DeviceConfig, mut shutdown: oneshot::Receiver<()>) {
    info!("IoT device {} started", config.device_id);
    info!("Posting readings to {}", config.webhook_url);
    info!(
        "Interval: {}s, temperature range: {:.1}°C - {:.1}°C",
        config.interval.as_secs(),
        config.min_temp,
        config.max_temp
    );

    let engine = DeliveryEngine::new(&config);
    let mut tracker = FailureTracker::new(config.max_consecutive_failures);
    let mut state = DeviceState::Running;

    loop {
        match state {
            DeviceState::Running => {
                let cycle =
                    AssertUnwindSafe(run_cycle(&config, &engine, &mut tracker)).catch_unwind();
                let next = tokio::select! {
                    _ = &mut shutdown => Some(DeviceState::Stopped),
                    result = cycle => result.ok(),
                };
                match next {
                    Some(next) => state = next,
                    None => {
                        error!(
                            "Device cycle panicked, restarting in {} seconds",
                            ERROR_BACKOFF_SECS
                        );
                        tokio::select! {
                            _ = &mut shutdown => state = DeviceState::Stopped,
                            _ = sleep(Duration::from_secs(ERROR_BACKOFF_SECS)) => {}
                        }
                    }
                }
            }
            DeviceState::CoolingDown => {
                tokio::select! {
                    _ = &mut shutdown => state = DeviceState::Stopped,
                    _ = sleep(config.cooldown) => {
                        tracker.reset();
                        info!("Cooldown complete, resuming delivery");
                        state = DeviceState::Running;
                    }
                }
            }
            DeviceState::Stopped => {
                info!("Shutdown signal received, closing outbound channel");
                break;
            }
        }
    }

    drop(engine);
    info!("IoT device stopped");
}

/// One supervisor iteration: generate, deliver, account, pace.
async fn run_cycle(
    config: &DeviceConfig,
    engine: &DeliveryEngine,
    tracker: &mut FailureTracker,
) -> DeviceState {
    let reading = generator::generate(config);
    let outcome = engine.deliver(&reading).await;

    let next = tracker.record(outcome);
    match next {
        DeviceState::CoolingDown => warn!(
            "{} consecutive failed cycles, cooling down for {} seconds",
            tracker.consecutive(),
            config.cooldown.as_secs()
        ),
        _ => sleep(config.interval).await,
    }
    next
}

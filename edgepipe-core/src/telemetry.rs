//! Telemetry generator
//!
//! Publishes a bounded run of synthetic readings, one every `interval`.
//!
//! ```text
//! for i in 1..=max:
//!     cancelled?            -> stop
//!     sample + encode
//!     send  (races cancel)  -> cancelled: stop, error: fail the run
//!     i < max: sleep (races cancel)
//! ```
//!
//! There is no retry and no rate adaptation: a failed send ends the run with
//! an error, and the spacing between sends does not account for how long a
//! send took.

use std::time::Duration;

use log::info;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::Connection,
    constants::time::{TELEMETRY_INTERVAL_MS, TELEMETRY_MAX_MESSAGES},
    errors::RelayResult,
    message::Message,
    reading::Reading,
};

/// Run length and cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Number of readings in one run
    pub max_messages: u32,
    /// Delay between two sends
    pub interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_messages: TELEMETRY_MAX_MESSAGES,
            interval: Duration::from_millis(TELEMETRY_INTERVAL_MS),
        }
    }
}

impl TelemetryConfig {
    /// Set the number of readings per run
    pub fn max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set the delay between sends
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Outcome of a generator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySummary {
    /// Readings whose send completed
    pub sent: u32,
    /// True if the run ended on cancellation rather than exhaustion
    pub cancelled: bool,
}

/// Produces and publishes synthetic readings
pub struct TelemetryGenerator<R> {
    config: TelemetryConfig,
    rng: R,
}

impl<R: Rng + Send> TelemetryGenerator<R> {
    /// Create a generator drawing from `rng`
    pub fn new(config: TelemetryConfig, rng: R) -> Self {
        Self { config, rng }
    }

    /// Run configuration
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Publish up to `max_messages` readings on `connection`
    ///
    /// Returns early, without error, once `cancel` fires. The token is
    /// checked before each iteration and raced against both the send and the
    /// inter-send delay.
    pub async fn run<C>(
        &mut self,
        connection: &C,
        cancel: &CancellationToken,
    ) -> RelayResult<TelemetrySummary>
    where
        C: Connection + ?Sized,
    {
        let max = self.config.max_messages;
        let mut summary = TelemetrySummary::default();

        for i in 1..=max {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let reading = Reading::sample(&mut self.rng);
            let payload = reading.to_json()?;
            info!(
                "{}/{} Sending Data {{Temperature: {}, Humidity: {}}}",
                i,
                max,
                reading.temperature(),
                reading.humidity()
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                sent = connection.send_event(Message::new(payload)) => sent?,
            }
            summary.sent += 1;
            info!(
                "{}/{} Sent Data {{Temperature: {}, Humidity: {}}}",
                i,
                max,
                reading.temperature(),
                reading.humidity()
            );

            if i < max {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.config.interval) => {}
                }
            }
        }

        Ok(summary)
    }
}

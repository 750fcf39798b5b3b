//! Sample edge module
//!
//! Publishes a run of simulated temperature/humidity readings and pipes
//! every message arriving on `input1` to `output1`, then idles until the
//! runtime unloads the module.

mod signal;

use std::sync::Arc;

use anyhow::{Context, Result};
use edgepipe_connectors::{MqttConfig, MqttConnection};
use edgepipe_core::{
    constants::routes::{INPUT_CHANNEL, OUTPUT_CHANNEL},
    Connection, MessagePipe, RelayError, TelemetryConfig, TelemetryGenerator,
};
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = MqttConfig::from_env().context("reading hub settings from the environment")?;
    let connection = Arc::new(MqttConnection::new(config));
    let mut faults = connection
        .take_faults()
        .context("fault channel already taken")?;

    let pipe = Arc::new(MessagePipe::new(&connection, OUTPUT_CHANNEL));
    Arc::clone(&pipe)
        .register(INPUT_CHANNEL)
        .await
        .context("registering input handler")?;

    connection
        .open()
        .await
        .context("opening hub connection")?;

    let cancel = CancellationToken::new();
    let signals = signal::spawn_signal_handler(cancel.clone());

    let outcome = run(connection.as_ref(), &cancel, &mut faults).await;

    if let Err(err) = connection.close().await {
        warn!("Closing hub connection failed: {}", err);
    }
    signals.abort();
    info!("Piped {} messages", pipe.received());

    outcome
}

/// Publish telemetry, then wait for unload; a handler fault ends either phase
async fn run(
    connection: &MqttConnection,
    cancel: &CancellationToken,
    faults: &mut UnboundedReceiver<RelayError>,
) -> Result<()> {
    let mut generator = TelemetryGenerator::new(TelemetryConfig::default(), StdRng::from_entropy());

    tokio::select! {
        summary = generator.run(connection, cancel) => {
            let summary = summary.context("sending telemetry")?;
            info!(
                "Telemetry run finished: {} readings sent{}",
                summary.sent,
                if summary.cancelled { " (cancelled)" } else { "" }
            );
        }
        Some(fault) = faults.recv() => {
            return Err(anyhow::Error::new(fault).context("piping message"));
        }
    }

    tokio::select! {
        _ = cancel.cancelled() => {}
        Some(fault) = faults.recv() => {
            return Err(anyhow::Error::new(fault).context("piping message"));
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

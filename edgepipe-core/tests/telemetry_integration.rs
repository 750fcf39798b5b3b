//! Telemetry generator against an in-memory connection
//!
//! Runs under a paused tokio clock, so the 5 second cadence costs nothing
//! and send timestamps can be compared exactly.

mod common;

use std::{sync::Arc, time::Duration};

use common::MemoryConnection;
use edgepipe_core::{
    constants::sensors::{TEMP_MAX_C, TEMP_MIN_C},
    Reading, RelayError, TelemetryConfig, TelemetryGenerator,
};
use rand::{rngs::StdRng, SeedableRng};
use tokio_util::sync::CancellationToken;

fn generator(config: TelemetryConfig) -> TelemetryGenerator<StdRng> {
    TelemetryGenerator::new(config, StdRng::seed_from_u64(42))
}

#[tokio::test(start_paused = true)]
async fn full_run_sends_every_reading() {
    let connection = MemoryConnection::new();
    let cancel = CancellationToken::new();

    let summary = generator(TelemetryConfig::default())
        .run(&connection, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.sent, 100);
    assert!(!summary.cancelled);

    let sent = connection.sent();
    assert_eq!(sent.len(), 100);
    for record in &sent {
        assert!(record.output.is_none(), "telemetry goes to the default route");
        let reading = Reading::from_json(record.message.body()).unwrap();
        assert!((TEMP_MIN_C..TEMP_MAX_C).contains(&reading.temperature()));
        assert!((0.0..100.0).contains(&reading.humidity()));
    }
}

#[tokio::test(start_paused = true)]
async fn sends_are_spaced_by_interval() {
    let connection = MemoryConnection::new();
    let cancel = CancellationToken::new();
    let started = tokio::time::Instant::now();

    generator(TelemetryConfig::default().max_messages(5))
        .run(&connection, &cancel)
        .await
        .unwrap();

    let sent = connection.sent();
    assert_eq!(sent.len(), 5);
    for pair in sent.windows(2) {
        assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(5));
    }

    // No trailing delay after the last reading
    assert_eq!(tokio::time::Instant::now() - started, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn spacing_ignores_send_latency() {
    let connection = MemoryConnection::with_latency(Duration::from_secs(2));
    let cancel = CancellationToken::new();

    generator(TelemetryConfig::default().max_messages(3))
        .run(&connection, &cancel)
        .await
        .unwrap();

    let sent = connection.sent();
    for pair in sent.windows(2) {
        assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(7));
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_sends_nothing() {
    let connection = MemoryConnection::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = generator(TelemetryConfig::default())
        .run(&connection, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.sent, 0);
    assert!(summary.cancelled);
    assert_eq!(connection.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_delay_stops_the_run() {
    let connection = Arc::new(MemoryConnection::new());
    let cancel = CancellationToken::new();

    let task = {
        let connection = Arc::clone(&connection);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            generator(TelemetryConfig::default())
                .run(connection.as_ref(), &cancel)
                .await
        })
    };

    // Iterations 1..=3 send at t = 0, 5, 10; cancel while waiting for the 4th
    tokio::time::sleep(Duration::from_millis(12_500)).await;
    cancel.cancel();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.sent, 3);
    assert!(summary.cancelled);
    assert_eq!(connection.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_in_flight_send() {
    let connection = Arc::new(MemoryConnection::with_latency(Duration::from_secs(10)));
    let cancel = CancellationToken::new();

    let task = {
        let connection = Arc::clone(&connection);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            generator(TelemetryConfig::default())
                .run(connection.as_ref(), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.sent, 0);
    assert!(summary.cancelled);
    assert_eq!(connection.attempts(), 1);
    assert!(connection.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_failure_ends_the_run() {
    let connection = MemoryConnection::failing_at(4);
    let cancel = CancellationToken::new();

    let result = generator(TelemetryConfig::default())
        .run(&connection, &cancel)
        .await;

    assert!(matches!(result, Err(RelayError::Send { .. })));
    assert_eq!(connection.sent().len(), 3);
    assert_eq!(connection.attempts(), 4);
}

//! Core of the EdgePipe sample module
//!
//! Two pieces of logic share one hub connection:
//! - [`TelemetryGenerator`] publishes a bounded run of synthetic
//!   temperature/humidity readings on a fixed cadence
//! - [`MessagePipe`] relays messages from an input channel to an output
//!   channel unchanged
//!
//! The connection itself is behind the [`Connection`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//! use edgepipe_core::{
//!     constants::routes::{INPUT_CHANNEL, OUTPUT_CHANNEL},
//!     Connection, MessagePipe, TelemetryConfig, TelemetryGenerator,
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run<C: Connection + 'static>(connection: Arc<C>) -> edgepipe_core::RelayResult<()> {
//!     connection.open().await?;
//!     Arc::new(MessagePipe::new(&connection, OUTPUT_CHANNEL))
//!         .register(INPUT_CHANNEL)
//!         .await?;
//!
//!     let cancel = CancellationToken::new();
//!     let mut generator = TelemetryGenerator::new(TelemetryConfig::default(), StdRng::from_entropy());
//!     generator.run(connection.as_ref(), &cancel).await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod constants;
pub mod errors;
pub mod message;
pub mod pipe;
pub mod reading;
pub mod telemetry;

// Public API
pub use connection::{input_handler, Connection, HandlerFuture, InputHandler};
pub use errors::{RelayError, RelayResult, ValidationError, ValidationResult};
pub use message::{Disposition, Message, Properties};
pub use pipe::MessagePipe;
pub use reading::Reading;
pub use telemetry::{TelemetryConfig, TelemetryGenerator, TelemetrySummary};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

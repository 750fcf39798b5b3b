//! Error Types for the Relay Module
//!
//! ## Error Categories
//!
//! ### Reading Violations
//! - `ValidationError::OutOfRange`: a reading outside the simulated envelope
//! - `ValidationError::InvalidValue`: NaN or infinity
//!
//! ### Relay Failures
//! - `RelayError::Setup`: the connection could not be opened
//! - `RelayError::Send`: a telemetry or forwarded message failed to send
//! - `RelayError::InvalidState`: a handler was invoked without a live connection
//!
//! None of the relay failures are recovered locally. A send failure ends the
//! generator run and is returned to the caller, which is expected to exit and
//! let the hosting runtime restart the module:
//!
//! ```rust
//! use edgepipe_core::RelayError;
//!
//! fn exit_code(err: &RelayError) -> i32 {
//!     match err {
//!         RelayError::Setup(_) => 2,
//!         RelayError::Send { .. } => 3,
//!         _ => 1,
//!     }
//! }
//! # assert_eq!(exit_code(&RelayError::NotConnected), 1);
//! ```
//!
//! Cancellation is not an error. A cancelled generator run returns `Ok`
//! with `TelemetrySummary::cancelled` set.

use thiserror::Error;

/// Result type for reading validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Reading validation errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    /// Value outside the accepted range
    #[error("Value {value} outside range [{min}, {max})")]
    OutOfRange {
        /// The rejected value
        value: f64,
        /// Minimum accepted value
        min: f64,
        /// Upper bound, exclusive
        max: f64,
    },

    /// Value is not a finite number
    #[error("Invalid value: not a valid number")]
    InvalidValue,
}

/// Failures surfaced by the generator, the pipe and connections
#[derive(Error, Debug)]
pub enum RelayError {
    /// Opening the connection failed
    #[error("Connection setup failed: {0}")]
    Setup(String),

    /// A send on the given route failed
    #[error("Send to {route} failed: {reason}")]
    Send {
        /// Route the message was addressed to
        route: String,
        /// Transport-level reason
        reason: String,
    },

    /// The handler context does not refer to a live connection
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Operation needs an open connection
    #[error("Not connected")]
    NotConnected,

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload decoded but carried an invalid reading
    #[error("Invalid reading: {0}")]
    Validation(#[from] ValidationError),
}

impl RelayError {
    /// Build a send failure for `route`
    pub fn send(route: impl Into<String>, reason: impl ToString) -> Self {
        Self::Send {
            route: route.into(),
            reason: reason.to_string(),
        }
    }
}

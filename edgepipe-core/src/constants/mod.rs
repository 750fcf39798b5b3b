//! Constants for EdgePipe Core
//!
//! Numeric limits and names used by the telemetry generator and the
//! message pipe live here instead of as magic numbers in the code.
//!
//! ## Organization
//!
//! - **Sensors**: Ranges and resolution of the simulated readings
//! - **Time**: Publish cadence and run length of the generator
//! - **Routes**: Channel names the module listens and publishes on

/// Simulated sensor ranges and resolution.
pub mod sensors;

/// Publish interval and run length for the telemetry loop.
pub mod time;

/// Input and output channel names.
pub mod routes;

//! Time-Related Constants
//!
//! Cadence of the telemetry loop.

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Delay between two telemetry sends (milliseconds).
///
/// Fixed regardless of how long the send took. No delay follows the last
/// reading of a run.
pub const TELEMETRY_INTERVAL_MS: u64 = 5 * MS_PER_SECOND;

/// Number of readings published by one generator run.
pub const TELEMETRY_MAX_MESSAGES: u32 = 100;

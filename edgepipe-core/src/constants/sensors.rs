//! Simulated Sensor Specifications
//!
//! The generator draws readings from a fixed envelope. The bounds here are
//! used both for sampling and for validating readings parsed off the wire.

// ===== TEMPERATURE =====

/// Lower bound of the temperature draw, in tenths of a degree Celsius.
///
/// Inclusive. Combined with [`TEMP_DRAW_MAX_DECI_C`] this gives readings on
/// a 0.1°C grid.
pub const TEMP_DRAW_MIN_DECI_C: i32 = -100;

/// Upper bound of the temperature draw, in tenths of a degree Celsius.
///
/// Exclusive, so the warmest reading produced is 29.9°C.
pub const TEMP_DRAW_MAX_DECI_C: i32 = 300;

/// Temperature resolution (°C per draw step).
pub const TEMP_RESOLUTION_C: f64 = 0.1;

/// Minimum accepted temperature (°C). Inclusive.
pub const TEMP_MIN_C: f64 = TEMP_DRAW_MIN_DECI_C as f64 / 10.0;

/// Maximum accepted temperature (°C). Exclusive.
pub const TEMP_MAX_C: f64 = TEMP_DRAW_MAX_DECI_C as f64 / 10.0;

// ===== HUMIDITY =====

/// Minimum relative humidity (%). Completely dry air.
pub const HUMIDITY_MIN_PCT: f64 = 0.0;

/// Maximum relative humidity (%). Saturated air, exclusive.
pub const HUMIDITY_MAX_PCT: f64 = 100.0;

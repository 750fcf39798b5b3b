//! Synthetic temperature/humidity reading
//!
//! A `Reading` is created fresh for each telemetry tick, encoded, sent and
//! dropped. On the wire it is a compact JSON object:
//!
//! ```text
//! {"Temperature":21.4,"Humidity":57.03125}
//! ```
//!
//! Readings are sampled from a fixed envelope:
//! - temperature: integer draw in [-100, 300) divided by 10, so [-10.0, 30.0)
//!   on a 0.1°C grid
//! - humidity: uniform in [0.0, 100.0)

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    constants::sensors::{
        HUMIDITY_MAX_PCT, HUMIDITY_MIN_PCT, TEMP_DRAW_MAX_DECI_C, TEMP_DRAW_MIN_DECI_C,
        TEMP_MAX_C, TEMP_MIN_C,
    },
    errors::{RelayResult, ValidationError, ValidationResult},
};

/// One temperature/humidity sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
}

impl Reading {
    /// Create a validated reading
    pub fn new(temperature: f64, humidity: f64) -> ValidationResult<Self> {
        check_range(temperature, TEMP_MIN_C, TEMP_MAX_C)?;
        check_range(humidity, HUMIDITY_MIN_PCT, HUMIDITY_MAX_PCT)?;
        Ok(Self {
            temperature,
            humidity,
        })
    }

    /// Draw a reading from the simulated envelope
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let deci = rng.gen_range(TEMP_DRAW_MIN_DECI_C..TEMP_DRAW_MAX_DECI_C);
        let humidity = rng.gen::<f64>() * HUMIDITY_MAX_PCT;
        Self {
            temperature: f64::from(deci) / 10.0,
            humidity,
        }
    }

    /// Temperature in °C
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in %
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Encode as compact JSON bytes
    pub fn to_json(&self) -> RelayResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON bytes and validate
    pub fn from_json(bytes: &[u8]) -> RelayResult<Self> {
        let raw: Reading = serde_json::from_slice(bytes)?;
        Ok(Self::new(raw.temperature, raw.humidity)?)
    }
}

fn check_range(value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue);
    }
    if value < min || value >= max {
        return Err(ValidationError::OutOfRange { value, min, max });
    }
    Ok(())
}

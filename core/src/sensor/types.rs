// Sensor types: readings carried in beacon Major/Minor fields

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single temperature/humidity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity, percent
    pub humidity: f32,
}

impl SensorReading {
    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C / {:.1}%", self.temperature, self.humidity)
    }
}

/// A decoded sensor beacon seen over the air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorObserved {
    /// Advertiser's device address as reported by the platform
    pub address: String,
    pub reading: SensorReading,
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Calibrated TX power at 1 m carried in the frame
    pub measured_power: i8,
    /// Approximate distance in meters, `-1.0` when unknown
    pub distance: f64,
}

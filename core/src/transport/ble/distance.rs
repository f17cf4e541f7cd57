/// RSSI to distance estimation
///
/// Log-distance path loss with the path-loss exponent folded into the
/// constant 20.0. This is a coarse, reproducible approximation, not a
/// measurement: walls, bodies and antenna orientation routinely move real
/// distances by a factor of two or more.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Returned when no usable signal strength was reported (`rssi == 0`).
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// Approximate distance in meters from the calibrated power at 1 m and the
/// observed RSSI, or [`UNKNOWN_DISTANCE`] when `rssi` is zero.
pub fn estimate_distance(measured_power: i8, rssi: i8) -> f64 {
    if rssi == 0 {
        return UNKNOWN_DISTANCE;
    }

    let ratio = (measured_power as f64 - rssi as f64) / 20.0;
    10f64.powf(ratio)
}

/// Coarse proximity zone, in the style of iBeacon ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proximity {
    /// Under half a meter
    Immediate,
    /// Under three meters
    Near,
    Far,
    /// No usable distance estimate
    Unknown,
}

impl Proximity {
    pub fn from_distance(distance: f64) -> Self {
        if distance < 0.0 || distance.is_nan() {
            Proximity::Unknown
        } else if distance < 0.5 {
            Proximity::Immediate
        } else if distance < 3.0 {
            Proximity::Near
        } else {
            Proximity::Far
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proximity::Immediate => write!(f, "Immediate"),
            Proximity::Near => write!(f, "Near"),
            Proximity::Far => write!(f, "Far"),
            Proximity::Unknown => write!(f, "Unknown"),
        }
    }
}

// Sensor codec: readings <-> iBeacon frames under the sensor UUID
//
// Temperature rides in Major, humidity in Minor, both as unsigned fixed
// point with one decimal digit. Values outside [0.0, 6553.5] saturate.

use super::types::SensorReading;
use super::uuid::{format_uuid, parse_uuid, SENSOR_UUID};
use crate::error::CodecError;
use crate::transport::ble::beacon::BeaconFrame;

/// Fixed-point scale applied to both readings on encode and decode.
pub const SCALE: f32 = 10.0;

/// Calibrated TX power at 1 m advertised by default (dBm).
pub const DEFAULT_MEASURED_POWER: i8 = -59;

/// Encodes readings under one proximity UUID and accepts only frames
/// carrying that UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCodec {
    sensor_uuid: [u8; 16],
    measured_power: i8,
}

impl Default for SensorCodec {
    fn default() -> Self {
        Self {
            sensor_uuid: SENSOR_UUID_BYTES,
            measured_power: DEFAULT_MEASURED_POWER,
        }
    }
}

/// Raw bytes of [`SENSOR_UUID`].
pub const SENSOR_UUID_BYTES: [u8; 16] = [
    0x6e, 0xf0, 0xe3, 0x0d, 0x73, 0x08, 0x44, 0x58, 0xb6, 0x2e, 0xf7, 0x06, 0xc6, 0x92, 0xca, 0x77,
];

impl SensorCodec {
    pub fn new(sensor_uuid: [u8; 16], measured_power: i8) -> Self {
        Self {
            sensor_uuid,
            measured_power,
        }
    }

    /// Build a codec from a UUID string in any accepted hex form.
    pub fn from_uuid_str(sensor_uuid: &str, measured_power: i8) -> Result<Self, CodecError> {
        Ok(Self::new(parse_uuid(sensor_uuid)?, measured_power))
    }

    pub fn sensor_uuid(&self) -> &[u8; 16] {
        &self.sensor_uuid
    }

    pub fn measured_power(&self) -> i8 {
        self.measured_power
    }

    /// Encode a reading. Out-of-range and NaN values saturate instead of failing.
    pub fn encode(&self, reading: &SensorReading) -> BeaconFrame {
        BeaconFrame {
            proximity_uuid: self.sensor_uuid,
            major: to_raw(reading.temperature),
            minor: to_raw(reading.humidity),
            measured_power: self.measured_power,
        }
    }

    /// Decode a frame, rejecting any whose UUID is not the sensor UUID.
    pub fn decode(&self, frame: &BeaconFrame) -> Result<SensorReading, CodecError> {
        if frame.proximity_uuid != self.sensor_uuid {
            return Err(CodecError::UuidMismatch {
                found: format_uuid(&frame.proximity_uuid),
            });
        }

        Ok(SensorReading {
            temperature: frame.major as f32 / SCALE,
            humidity: frame.minor as f32 / SCALE,
        })
    }
}

/// Scale, round and clamp to the u16 wire range. `as` saturates and maps NaN to 0.
fn to_raw(value: f32) -> u16 {
    (value * SCALE).round() as u16
}

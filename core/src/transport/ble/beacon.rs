/// iBeacon frame construction and parsing
///
/// The frame is the 23-byte payload carried in Apple (0x004C) manufacturer
/// specific data:
///
/// | Offset | Size | Field                          |
/// |--------|------|--------------------------------|
/// | 0      | 1    | frame type, always `0x02`      |
/// | 1      | 1    | frame length, always `0x15`    |
/// | 2      | 16   | proximity UUID                 |
/// | 18     | 2    | Major, big-endian              |
/// | 20     | 2    | Minor, big-endian              |
/// | 22     | 1    | measured power at 1 m, signed  |
///
/// Any syntactically valid frame is accepted here; deciding whether the UUID
/// belongs to us is the sensor codec's job.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// iBeacon frame type marker
pub const FRAME_TYPE: u8 = 0x02;

/// Number of bytes following the length field
pub const FRAME_LENGTH: u8 = 0x15;

/// Total serialized frame size in bytes
pub const FRAME_SIZE: usize = 23;

/// An iBeacon advertisement frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeaconFrame {
    /// Proximity UUID, opaque bytes
    pub proximity_uuid: [u8; 16],
    /// Major value
    pub major: u16,
    /// Minor value
    pub minor: u16,
    /// Calibrated TX power at 1 meter in dBm
    pub measured_power: i8,
}

impl BeaconFrame {
    /// Serialize to the fixed 23-byte layout
    pub fn serialize(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        out[0] = FRAME_TYPE;
        out[1] = FRAME_LENGTH;
        out[2..18].copy_from_slice(&self.proximity_uuid);
        out[18..20].copy_from_slice(&self.major.to_be_bytes());
        out[20..22].copy_from_slice(&self.minor.to_be_bytes());
        out[22] = self.measured_power as u8;
        out
    }

    /// Parse a frame from manufacturer data. Trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < FRAME_SIZE {
            return Err(CodecError::TooShort { len: bytes.len() });
        }

        if bytes[0] != FRAME_TYPE || bytes[1] != FRAME_LENGTH {
            return Err(CodecError::BadMarker {
                found: [bytes[0], bytes[1]],
            });
        }

        let mut proximity_uuid = [0u8; 16];
        proximity_uuid.copy_from_slice(&bytes[2..18]);

        Ok(Self {
            proximity_uuid,
            major: u16::from_be_bytes([bytes[18], bytes[19]]),
            minor: u16::from_be_bytes([bytes[20], bytes[21]]),
            measured_power: bytes[22] as i8,
        })
    }
}

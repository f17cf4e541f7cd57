// Sensor module: readings, proximity UUIDs and the sensor beacon codec

pub mod codec;
pub mod types;
pub mod uuid;

pub use codec::{SensorCodec, DEFAULT_MEASURED_POWER, SCALE, SENSOR_UUID_BYTES};
pub use types::{SensorObserved, SensorReading};
pub use self::uuid::{format_uuid, normalize_uuid, parse_uuid, SENSOR_UUID};

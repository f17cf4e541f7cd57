//! User-configurable beacon settings
//!
//! Settings that control the sensor beacon at the application level:
//! - Sensor proximity UUID and calibrated measured power
//! - Scan device-name filter and publish cadence
//! - Advertiser and scanner radio settings

use crate::error::ConfigError;
use crate::sensor::{parse_uuid, SensorCodec, DEFAULT_MEASURED_POWER, SENSOR_UUID};
use crate::transport::abstraction::{AdvertiseSettings, ScanSettings};
use crate::transport::ble::ad::APPLE_COMPANY_ID;
use crate::transport::ble::scanner::ScanFilterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete beacon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Proximity UUID identifying sensor beacons
    pub sensor_uuid: String,

    /// Calibrated RSSI at 1 m, advertised in every frame
    pub measured_power: i8,

    /// Only accept scan results advertising this local name. The name is
    /// never advertised by us: a 23-byte iBeacon frame leaves no room for it
    /// in 31 bytes of legacy advertising data.
    pub device_name: Option<String>,

    /// Interval between published readings
    pub publish_interval_ms: u64,

    pub advertise: AdvertiseSettings,

    pub scan: ScanSettings,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            sensor_uuid: SENSOR_UUID.to_string(),
            measured_power: DEFAULT_MEASURED_POWER,
            device_name: None,
            publish_interval_ms: 2000,
            advertise: AdvertiseSettings::default(),
            scan: ScanSettings::default(),
        }
    }
}

impl BeaconConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_uuid(&self.sensor_uuid)?;

        // Calibration values outside this window are not physical for BLE
        if !(-100..=20).contains(&self.measured_power) {
            return Err(ConfigError::Invalid(format!(
                "measured_power must be -100..=20 dBm, got {}",
                self.measured_power
            )));
        }

        if self.publish_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "publish_interval_ms must be > 0".to_string(),
            ));
        }

        if let Some(name) = &self.device_name {
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "device_name cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Sensor codec for this configuration
    pub fn sensor_codec(&self) -> Result<SensorCodec, ConfigError> {
        Ok(SensorCodec::from_uuid_str(&self.sensor_uuid, self.measured_power)?)
    }

    /// Scan filter matching beacons produced under this configuration
    pub fn scan_filter(&self) -> ScanFilterConfig {
        ScanFilterConfig {
            manufacturer_id: APPLE_COMPANY_ID,
            device_name: self.device_name.clone(),
        }
    }

    /// Load from a JSON file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: BeaconConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

// Configuration management for the sensorbeacon CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/sensorbeacon/config.json
// - Linux: ~/.config/sensorbeacon/config.json
// - Windows: %APPDATA%\sensorbeacon\config.json

use anyhow::{Context, Result};
use sensorbeacon_core::BeaconConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Beacon settings bound to the file they were loaded from
#[derive(Debug, Clone)]
pub struct Config {
    pub beacon: BeaconConfig,
    path: PathBuf,
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("sensorbeacon");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file()?)
    }

    /// Load config from `path`, creating a default file if it does not exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let beacon = BeaconConfig::load_from(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok(Self { beacon, path })
        } else {
            let config = Self {
                beacon: BeaconConfig::default(),
                path,
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Save config to its file
    pub fn save(&self) -> Result<()> {
        self.beacon
            .save_to(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set a config value. The whole config is validated before saving, so
    /// a bad value leaves the file untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.beacon.clone();

        match key {
            "sensor_uuid" => updated.sensor_uuid = value.to_string(),
            "measured_power" => {
                updated.measured_power = value.parse().context("Invalid dBm value")?;
            }
            "device_name" => {
                updated.device_name = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "publish_interval_ms" => {
                updated.publish_interval_ms = value.parse().context("Invalid number")?;
            }
            "advertise.mode" => updated.advertise.mode = parse_variant(value)?,
            "advertise.tx_power" => updated.advertise.tx_power = parse_variant(value)?,
            "advertise.connectable" => {
                updated.advertise.connectable = value.parse().context("Invalid boolean value")?;
            }
            "advertise.timeout_ms" => {
                updated.advertise.timeout_ms = value.parse().context("Invalid number")?;
            }
            "scan.mode" => updated.scan.mode = parse_variant(value)?,
            "scan.match_mode" => updated.scan.match_mode = parse_variant(value)?,
            "scan.num_matches" => updated.scan.num_matches = parse_variant(value)?,
            "scan.report_delay_ms" => {
                updated.scan.report_delay_ms = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        updated.validate().context("Invalid configuration")?;
        self.beacon = updated;
        self.save()
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        let b = &self.beacon;
        vec![
            ("sensor_uuid".to_string(), b.sensor_uuid.clone()),
            ("measured_power".to_string(), b.measured_power.to_string()),
            (
                "device_name".to_string(),
                b.device_name.clone().unwrap_or_default(),
            ),
            (
                "publish_interval_ms".to_string(),
                b.publish_interval_ms.to_string(),
            ),
            ("advertise.mode".to_string(), variant_name(&b.advertise.mode)),
            (
                "advertise.tx_power".to_string(),
                variant_name(&b.advertise.tx_power),
            ),
            (
                "advertise.connectable".to_string(),
                b.advertise.connectable.to_string(),
            ),
            (
                "advertise.timeout_ms".to_string(),
                b.advertise.timeout_ms.to_string(),
            ),
            ("scan.mode".to_string(), variant_name(&b.scan.mode)),
            ("scan.match_mode".to_string(), variant_name(&b.scan.match_mode)),
            (
                "scan.num_matches".to_string(),
                variant_name(&b.scan.num_matches),
            ),
            (
                "scan.report_delay_ms".to_string(),
                b.scan.report_delay_ms.to_string(),
            ),
        ]
    }
}

/// Parse a unit enum variant by its serialized name, e.g. `LowLatency`
fn parse_variant<T: DeserializeOwned>(value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Invalid value: {}", value))
}

fn variant_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorbeacon_core::transport::{AdvertiseMode, ScanMode};
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.beacon, BeaconConfig::default());
    }

    #[test]
    fn test_set_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.set("measured_power", "-65").unwrap();
        config.set("advertise.mode", "LowLatency").unwrap();
        config.set("scan.mode", "Balanced").unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.beacon.measured_power, -65);
        assert_eq!(reloaded.beacon.advertise.mode, AdvertiseMode::LowLatency);
        assert_eq!(reloaded.beacon.scan.mode, ScanMode::Balanced);
        assert_eq!(reloaded.get("advertise.mode").as_deref(), Some("LowLatency"));
    }

    #[test]
    fn test_invalid_value_not_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        assert!(config.set("sensor_uuid", "not-a-uuid").is_err());
        assert!(config.set("publish_interval_ms", "0").is_err());
        assert!(config.set("advertise.mode", "Warp").is_err());
        assert!(config.set("no_such_key", "1").is_err());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.beacon, BeaconConfig::default());
    }

    #[test]
    fn test_empty_device_name_clears_filter() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_from(dir.path().join("config.json")).unwrap();

        config.set("device_name", "greenhouse").unwrap();
        assert_eq!(config.get("device_name").as_deref(), Some("greenhouse"));

        config.set("device_name", "").unwrap();
        assert_eq!(config.beacon.device_name, None);
    }

    #[test]
    fn test_list_covers_every_key() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(dir.path().join("config.json")).unwrap();

        for (key, _) in config.list() {
            assert!(config.get(&key).is_some(), "missing {}", key);
        }
        assert_eq!(config.get("sensor_uuid").as_deref(), Some(sensorbeacon_core::SENSOR_UUID));
    }
}

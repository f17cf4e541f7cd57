//! Platform radio abstraction for SensorBeacon
//!
//! Defines the collaborator interfaces a platform (Android, BlueZ, a test
//! double) implements, the settings handed to it, and the tagged events it
//! reports back. Platform callbacks are modeled as plain event values that
//! carry the [`SessionHandle`] of the request that produced them, so a
//! session can tell current results from stale ones.

use crate::error::PlatformError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// HANDLES
// ============================================================================

/// Identity of one start request issued by a session.
///
/// Handles increase monotonically per session; an event whose handle is not
/// the session's current one belongs to a superseded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionHandle(pub u64);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Advertising interval trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertiseMode {
    /// ~1 Hz, saves battery
    LowPower,
    /// ~4 Hz
    Balanced,
    /// ~10 Hz
    LowLatency,
}

/// Transmit power class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPowerLevel {
    UltraLow,
    Low,
    Medium,
    High,
}

impl TxPowerLevel {
    /// Typical radiated power in dBm for this class
    pub fn dbm(&self) -> i8 {
        match self {
            TxPowerLevel::UltraLow => -21,
            TxPowerLevel::Low => -15,
            TxPowerLevel::Medium => -7,
            TxPowerLevel::High => 1,
        }
    }
}

/// Settings for one advertisement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseSettings {
    pub mode: AdvertiseMode,
    pub tx_power: TxPowerLevel,
    /// Beacons are broadcast-only by default
    pub connectable: bool,
    /// Advertising timeout in milliseconds, 0 = advertise until stopped
    pub timeout_ms: u32,
}

impl Default for AdvertiseSettings {
    fn default() -> Self {
        Self {
            mode: AdvertiseMode::LowPower,
            tx_power: TxPowerLevel::Medium,
            connectable: false,
            timeout_ms: 0,
        }
    }
}

/// Scan duty cycle trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    LowPower,
    Balanced,
    LowLatency,
}

/// How eagerly the controller reports a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Report on the first weak advertisement
    Aggressive,
    /// Require a stronger, repeated signal
    Sticky,
}

/// How many advertisements per device the controller matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumMatches {
    One,
    Few,
    Max,
}

/// Scan settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub mode: ScanMode,
    pub match_mode: MatchMode,
    pub num_matches: NumMatches,
    /// Batch delay in milliseconds, 0 = report immediately
    pub report_delay_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            mode: ScanMode::LowPower,
            match_mode: MatchMode::Aggressive,
            num_matches: NumMatches::One,
            report_delay_ms: 0,
        }
    }
}

/// Platform-side scan filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub manufacturer_id: Option<u16>,
    /// Manufacturer data must start with these bytes
    pub manufacturer_data_prefix: Vec<u8>,
    pub device_name: Option<String>,
}

impl ScanFilter {
    /// Whether a raw advertisement passes this filter
    pub fn matches(&self, raw: &[u8]) -> bool {
        use super::ble::ad::{find_local_name, find_manufacturer_data};

        if let Some(company_id) = self.manufacturer_id {
            match find_manufacturer_data(raw, company_id) {
                Some(data) if data.starts_with(&self.manufacturer_data_prefix) => {}
                _ => return false,
            }
        }

        if let Some(name) = &self.device_name {
            if find_local_name(raw).as_deref() != Some(name.as_str()) {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// EVENTS (platform -> session)
// ============================================================================

/// Result of an advertising request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseOutcome {
    /// The controller is broadcasting
    Started,
    /// Start failed with a platform error code
    Failed(i32),
    /// The controller stopped on its own (timeout, radio off)
    Stopped,
}

/// Asynchronous advertising result tagged with its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertiseEvent {
    pub handle: SessionHandle,
    pub outcome: AdvertiseOutcome,
}

/// A raw advertisement delivered to a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub handle: SessionHandle,
    /// Advertiser address as the platform reports it
    pub address: String,
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Raw advertising data (AD structures)
    pub data: Vec<u8>,
}

/// Asynchronous scan failure tagged with its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanFailure {
    pub handle: SessionHandle,
    pub code: i32,
}

// ============================================================================
// PLATFORM TRAITS
// ============================================================================

/// Platform advertiser.
///
/// `start_advertising` is a request: returning `Ok` means it was accepted,
/// the definitive result arrives later as an [`AdvertiseEvent`]. An `Err`
/// means the request was refused outright.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformAdvertiser: Send + Sync {
    fn start_advertising(
        &self,
        handle: SessionHandle,
        settings: &AdvertiseSettings,
        data: &[u8],
    ) -> Result<(), PlatformError>;

    /// Request that the advertisement for `handle` stop. Idempotent.
    fn stop_advertising(&self, handle: SessionHandle);
}

/// Platform scanner.
///
/// Accepted scans deliver [`ScanReport`]s and at most one [`ScanFailure`]
/// tagged with the request's handle.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformScanner: Send + Sync {
    fn start_scan(
        &self,
        handle: SessionHandle,
        filters: &[ScanFilter],
        settings: &ScanSettings,
    ) -> Result<(), PlatformError>;

    /// Request that the scan for `handle` stop. Idempotent.
    fn stop_scan(&self, handle: SessionHandle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ble::ad::{AdvertisePayload, APPLE_COMPANY_ID, IBEACON_PREFIX};

    fn ibeacon_raw() -> Vec<u8> {
        let mut frame = IBEACON_PREFIX.to_vec();
        frame.extend_from_slice(&[0u8; 21]);
        AdvertisePayload::ibeacon(&frame).to_bytes().unwrap()
    }

    #[test]
    fn test_default_advertise_settings() {
        let settings = AdvertiseSettings::default();
        assert_eq!(settings.mode, AdvertiseMode::LowPower);
        assert_eq!(settings.tx_power, TxPowerLevel::Medium);
        assert!(!settings.connectable);
        assert_eq!(settings.timeout_ms, 0);
    }

    #[test]
    fn test_default_scan_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.mode, ScanMode::LowPower);
        assert_eq!(settings.match_mode, MatchMode::Aggressive);
        assert_eq!(settings.num_matches, NumMatches::One);
        assert_eq!(settings.report_delay_ms, 0);
    }

    #[test]
    fn test_filter_matches_ibeacon() {
        let filter = ScanFilter {
            manufacturer_id: Some(APPLE_COMPANY_ID),
            manufacturer_data_prefix: IBEACON_PREFIX.to_vec(),
            device_name: None,
        };
        assert!(filter.matches(&ibeacon_raw()));
        assert!(!filter.matches(&[0x02, 0x01, 0x06]));
    }

    #[test]
    fn test_filter_prefix_mismatch() {
        let filter = ScanFilter {
            manufacturer_id: Some(APPLE_COMPANY_ID),
            manufacturer_data_prefix: vec![0x10, 0x05],
            device_name: None,
        };
        assert!(!filter.matches(&ibeacon_raw()));
    }

    #[test]
    fn test_filter_device_name() {
        let filter = ScanFilter {
            manufacturer_id: None,
            manufacturer_data_prefix: Vec::new(),
            device_name: Some("LE".to_string()),
        };
        assert!(!filter.matches(&ibeacon_raw()));
        assert!(filter.matches(&[0x03, 0x09, b'L', b'E']));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(SessionHandle(7).to_string(), "#7");
    }
}

/// BLE (Bluetooth Low Energy) Beacon Module
///
/// This module provides the protocol-level pieces of the sensor beacon:
///
/// - **ad**: advertising data (AD structure) framing and manufacturer data lookup
/// - **beacon**: the 23-byte iBeacon frame layout
/// - **distance**: RSSI to distance estimation
/// - **advertiser**: advertising session state machine
/// - **scanner**: scan session state machine and sensor dispatch
///
/// The module is designed to work with platform-specific implementations (Kotlin,
/// BlueZ) that handle the actual radio. The core logic here is testable without
/// BLE hardware.

pub mod ad;
pub mod advertiser;
pub mod beacon;
pub mod distance;
pub mod scanner;

// Re-export commonly used types
pub use ad::{
    find_local_name, find_manufacturer_data, parse_ad_structures, AdStructure, AdvertisePayload,
    APPLE_COMPANY_ID, IBEACON_PREFIX, MAX_ADVERTISING_DATA,
};

pub use advertiser::{AdvertisingEvent, AdvertisingListener, AdvertisingSession, AdvertisingState};

pub use beacon::{BeaconFrame, FRAME_LENGTH, FRAME_SIZE, FRAME_TYPE};

pub use distance::{estimate_distance, Proximity, UNKNOWN_DISTANCE};

pub use scanner::{
    decode_report, ScanEvent, ScanFilterConfig, ScanListener, ScanSession, ScanStats,
    ScannerState, StartOutcome,
};

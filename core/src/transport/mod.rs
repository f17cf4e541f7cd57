// Transport module: platform radio abstraction and BLE beacon sessions

pub mod abstraction;
pub mod ble;
pub mod loopback;

pub use abstraction::{
    AdvertiseEvent, AdvertiseMode, AdvertiseOutcome, AdvertiseSettings, MatchMode, NumMatches,
    PlatformAdvertiser, PlatformScanner, ScanFailure, ScanFilter, ScanMode, ScanReport,
    ScanSettings, SessionHandle, TxPowerLevel,
};
pub use loopback::{dispatch_event, pump_events, LoopbackRadio, RadioCall, RadioEvent};

// SensorBeacon Core: iBeacon sensor payloads and radio session lifecycle
//
// Temperature and humidity ride in the Major/Minor fields of an Apple
// iBeacon frame. This crate encodes and decodes that frame and drives the
// advertise/scan state machines around a platform-provided radio.

pub mod error;
pub mod logging;
pub mod platform;
pub mod sensor;
pub mod transport;

pub use error::{CodecError, ConfigError, PlatformError, SessionError};
pub use platform::{AllGranted, BeaconConfig, GrantedPermissions, Permission, Permissions};
pub use sensor::{SensorCodec, SensorObserved, SensorReading, SCALE, SENSOR_UUID};
pub use transport::ble::{
    AdvertisingEvent, AdvertisingSession, AdvertisingState, BeaconFrame, ScanEvent,
    ScanFilterConfig, ScanSession, ScannerState, StartOutcome,
};
pub use transport::{PlatformAdvertiser, PlatformScanner, SessionHandle};

use std::sync::Arc;

/// Both sessions wired to one radio, built from a [`BeaconConfig`]
pub struct BeaconNode {
    pub advertising: Arc<AdvertisingSession>,
    pub scanning: Arc<ScanSession>,
}

impl BeaconNode {
    /// Validate `config` and build idle sessions over `radio`
    pub fn new<R>(
        config: &BeaconConfig,
        radio: Arc<R>,
        permissions: Arc<dyn Permissions>,
    ) -> Result<Self, ConfigError>
    where
        R: PlatformAdvertiser + PlatformScanner + 'static,
    {
        config.validate()?;
        let codec = config.sensor_codec()?;

        let advertising = AdvertisingSession::new(
            codec.clone(),
            config.advertise.clone(),
            radio.clone(),
            permissions.clone(),
        );
        let scanning = ScanSession::new(codec, config.scan.clone(), radio, permissions);

        Ok(Self {
            advertising: Arc::new(advertising),
            scanning: Arc::new(scanning),
        })
    }

    /// Stop both sessions
    pub fn shutdown(&self) {
        self.advertising.stop();
        self.scanning.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackRadio;

    #[test]
    fn test_node_rejects_invalid_config() {
        let (radio, _rx) = LoopbackRadio::new("loopback", -59);
        let config = BeaconConfig {
            sensor_uuid: "bogus".to_string(),
            ..Default::default()
        };
        assert!(BeaconNode::new(&config, radio, Arc::new(AllGranted)).is_err());
    }

    #[test]
    fn test_node_starts_idle() {
        let (radio, _rx) = LoopbackRadio::new("loopback", -59);
        let node = BeaconNode::new(&BeaconConfig::default(), radio, Arc::new(AllGranted)).unwrap();

        assert_eq!(node.advertising.state(), AdvertisingState::Idle);
        assert_eq!(node.scanning.state(), ScannerState::Idle);
        node.shutdown();
    }
}

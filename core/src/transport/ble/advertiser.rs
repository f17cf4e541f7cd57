/// BLE advertising session
///
/// Owns "am I advertising, with which frame". Every publish replaces the
/// running advertisement: the old handle is stopped and a new one started
/// under a single lock, so callers never observe a half-replaced session.
/// Platform results are matched on handle identity and stale ones dropped.

use super::ad::AdvertisePayload;
use super::beacon::BeaconFrame;
use crate::error::{PlatformError, SessionError};
use crate::platform::{Permission, Permissions};
use crate::sensor::{SensorCodec, SensorReading};
use crate::transport::abstraction::{
    AdvertiseEvent, AdvertiseOutcome, AdvertiseSettings, PlatformAdvertiser, SessionHandle,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Advertising session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingState {
    /// Nothing on air
    Idle,
    /// `frame` requested under `handle`; `confirmed` once the platform
    /// reported the start
    Advertising {
        handle: SessionHandle,
        frame: BeaconFrame,
        confirmed: bool,
    },
}

/// Notifications emitted to the registered listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisingEvent {
    Started {
        handle: SessionHandle,
        frame: BeaconFrame,
    },
    /// The platform rejected the advertisement; the session is idle again
    Failed {
        handle: SessionHandle,
        error: PlatformError,
    },
    /// The platform stopped advertising on its own
    Stopped { handle: SessionHandle },
}

/// Receives advertising notifications
pub trait AdvertisingListener: Send + Sync {
    fn on_advertising_event(&self, event: AdvertisingEvent);
}

impl AdvertisingListener for mpsc::UnboundedSender<AdvertisingEvent> {
    fn on_advertising_event(&self, event: AdvertisingEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Single-owner advertising session over a platform advertiser
pub struct AdvertisingSession {
    codec: SensorCodec,
    settings: AdvertiseSettings,
    advertiser: Arc<dyn PlatformAdvertiser>,
    permissions: Arc<dyn Permissions>,
    state: Mutex<AdvertisingState>,
    next_handle: AtomicU64,
    listener: RwLock<Option<Arc<dyn AdvertisingListener>>>,
}

impl AdvertisingSession {
    /// Create an idle session
    pub fn new(
        codec: SensorCodec,
        settings: AdvertiseSettings,
        advertiser: Arc<dyn PlatformAdvertiser>,
        permissions: Arc<dyn Permissions>,
    ) -> Self {
        Self {
            codec,
            settings,
            advertiser,
            permissions,
            state: Mutex::new(AdvertisingState::Idle),
            next_handle: AtomicU64::new(1),
            listener: RwLock::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> AdvertisingState {
        *self.state.lock()
    }

    pub fn is_advertising(&self) -> bool {
        matches!(*self.state.lock(), AdvertisingState::Advertising { .. })
    }

    /// Frame currently requested on air, if any
    pub fn current_frame(&self) -> Option<BeaconFrame> {
        match *self.state.lock() {
            AdvertisingState::Advertising { frame, .. } => Some(frame),
            AdvertisingState::Idle => None,
        }
    }

    /// Register the listener, replacing any previous one
    pub fn subscribe(&self, listener: Arc<dyn AdvertisingListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Remove the listener
    pub fn unsubscribe(&self) {
        *self.listener.write() = None;
    }

    /// Advertise `reading`, replacing whatever is on air.
    ///
    /// Refused with [`SessionError::PermissionDenied`] before touching the
    /// platform if advertising is not permitted. On platform refusal the
    /// session is left idle.
    pub fn publish(&self, reading: &SensorReading) -> Result<SessionHandle, SessionError> {
        if !self.permissions.is_granted(Permission::BluetoothAdvertise) {
            warn!("Advertise refused: {} not granted", Permission::BluetoothAdvertise);
            return Err(SessionError::PermissionDenied(Permission::BluetoothAdvertise));
        }

        let frame = self.codec.encode(reading);

        let mut state = self.state.lock();

        if let AdvertisingState::Advertising { handle, .. } = *state {
            self.advertiser.stop_advertising(handle);
            *state = AdvertisingState::Idle;
        }

        let data = match AdvertisePayload::ibeacon(&frame.serialize()).to_bytes() {
            Ok(data) => data,
            Err(e) => {
                warn!("Advertising payload rejected: {}", e);
                return Err(e.into());
            }
        };

        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        match self.advertiser.start_advertising(handle, &self.settings, &data) {
            Ok(()) => {
                debug!(
                    "Advertising {} requested: major={} minor={}",
                    handle, frame.major, frame.minor
                );
                *state = AdvertisingState::Advertising {
                    handle,
                    frame,
                    confirmed: false,
                };
                Ok(handle)
            }
            Err(e) => {
                warn!("Advertising {} refused by platform: {}", handle, e);
                Err(e.into())
            }
        }
    }

    /// Stop advertising. Returns `false` if the session was already idle.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            AdvertisingState::Advertising { handle, .. } => {
                self.advertiser.stop_advertising(handle);
                *state = AdvertisingState::Idle;
                info!("Advertising {} stopped", handle);
                true
            }
            AdvertisingState::Idle => false,
        }
    }

    /// Apply an asynchronous platform result.
    ///
    /// Results for any handle other than the current one are ignored.
    pub fn handle_event(&self, event: AdvertiseEvent) -> Option<AdvertisingEvent> {
        let emitted = {
            let mut state = self.state.lock();

            let (handle, frame, confirmed) = match *state {
                AdvertisingState::Advertising {
                    handle,
                    frame,
                    confirmed,
                } if handle == event.handle => (handle, frame, confirmed),
                _ => {
                    debug!("Ignoring stale advertise event for {}", event.handle);
                    return None;
                }
            };

            match event.outcome {
                AdvertiseOutcome::Started => {
                    if confirmed {
                        return None;
                    }
                    *state = AdvertisingState::Advertising {
                        handle,
                        frame,
                        confirmed: true,
                    };
                    info!("Advertising {} started", handle);
                    AdvertisingEvent::Started { handle, frame }
                }
                AdvertiseOutcome::Failed(code) => {
                    let error = PlatformError::from_advertise_code(code);
                    *state = AdvertisingState::Idle;
                    warn!("Advertising {} failed (code {}): {}", handle, code, error);
                    AdvertisingEvent::Failed { handle, error }
                }
                AdvertiseOutcome::Stopped => {
                    *state = AdvertisingState::Idle;
                    info!("Advertising {} stopped by platform", handle);
                    AdvertisingEvent::Stopped { handle }
                }
            }
        };

        // Listener runs outside the state lock so it may call back in
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_advertising_event(emitted.clone());
        }
        Some(emitted)
    }
}

impl Drop for AdvertisingSession {
    fn drop(&mut self) {
        if let AdvertisingState::Advertising { handle, .. } = *self.state.get_mut() {
            self.advertiser.stop_advertising(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{AllGranted, GrantedPermissions};
    use crate::transport::abstraction::MockPlatformAdvertiser;
    use crate::transport::ble::ad::find_manufacturer_data;
    use crate::transport::ble::ad::APPLE_COMPANY_ID;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn session_with(advertiser: MockPlatformAdvertiser) -> AdvertisingSession {
        AdvertisingSession::new(
            SensorCodec::default(),
            AdvertiseSettings::default(),
            Arc::new(advertiser),
            Arc::new(AllGranted),
        )
    }

    fn accepting_mock() -> MockPlatformAdvertiser {
        let mut mock = MockPlatformAdvertiser::new();
        mock.expect_start_advertising().returning(|_, _, _| Ok(()));
        mock.expect_stop_advertising().returning(|_| ());
        mock
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session_with(MockPlatformAdvertiser::new());
        assert_eq!(session.state(), AdvertisingState::Idle);
        assert!(session.current_frame().is_none());
    }

    #[test]
    fn test_publish_sends_encoded_frame() {
        let mut mock = MockPlatformAdvertiser::new();
        mock.expect_start_advertising()
            .withf(|handle, _, data| {
                let frame = find_manufacturer_data(data, APPLE_COMPANY_ID)
                    .and_then(|bytes| BeaconFrame::parse(bytes).ok());
                *handle == SessionHandle(1)
                    && frame.map(|f| (f.major, f.minor)) == Some((234, 552))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_stop_advertising().returning(|_| ());

        let session = session_with(mock);
        let handle = session.publish(&SensorReading::new(23.4, 55.2)).unwrap();

        assert_eq!(handle, SessionHandle(1));
        assert!(session.is_advertising());
        assert_eq!(session.current_frame().map(|f| f.major), Some(234));
    }

    #[test]
    fn test_republish_stops_then_starts() {
        let mut seq = Sequence::new();
        let mut mock = MockPlatformAdvertiser::new();
        mock.expect_start_advertising()
            .withf(|handle, _, _| *handle == SessionHandle(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_stop_advertising()
            .with(eq(SessionHandle(1)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ());
        mock.expect_start_advertising()
            .withf(|handle, _, _| *handle == SessionHandle(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_stop_advertising()
            .with(eq(SessionHandle(2)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ());

        let session = session_with(mock);
        session.publish(&SensorReading::new(20.0, 40.0)).unwrap();
        session.publish(&SensorReading::new(21.0, 41.0)).unwrap();

        assert_eq!(session.current_frame().map(|f| f.major), Some(210));
        // Dropping the session stops handle 2
    }

    #[test]
    fn test_platform_refusal_leaves_idle() {
        let mut mock = MockPlatformAdvertiser::new();
        mock.expect_start_advertising()
            .returning(|_, _, _| Err(PlatformError::FeatureUnsupported));

        let session = session_with(mock);
        let result = session.publish(&SensorReading::new(20.0, 40.0));

        assert_eq!(
            result,
            Err(SessionError::Platform(PlatformError::FeatureUnsupported))
        );
        assert_eq!(session.state(), AdvertisingState::Idle);
    }

    #[test]
    fn test_permission_denied_before_platform_call() {
        // No expectations: any platform call panics the mock
        let session = AdvertisingSession::new(
            SensorCodec::default(),
            AdvertiseSettings::default(),
            Arc::new(MockPlatformAdvertiser::new()),
            Arc::new(GrantedPermissions::new([Permission::BluetoothScan])),
        );

        let result = session.publish(&SensorReading::new(20.0, 40.0));
        assert_eq!(
            result,
            Err(SessionError::PermissionDenied(Permission::BluetoothAdvertise))
        );
        assert_eq!(session.state(), AdvertisingState::Idle);
    }

    #[test]
    fn test_started_event_confirms() {
        let session = session_with(accepting_mock());
        let handle = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();

        let event = session.handle_event(AdvertiseEvent {
            handle,
            outcome: AdvertiseOutcome::Started,
        });

        assert!(matches!(event, Some(AdvertisingEvent::Started { .. })));
        assert!(matches!(
            session.state(),
            AdvertisingState::Advertising { confirmed: true, .. }
        ));

        // Duplicate confirmation is not re-emitted
        assert!(session
            .handle_event(AdvertiseEvent {
                handle,
                outcome: AdvertiseOutcome::Started,
            })
            .is_none());
    }

    #[test]
    fn test_failure_event_classified_and_idles() {
        let session = session_with(accepting_mock());
        let handle = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();

        let event = session.handle_event(AdvertiseEvent {
            handle,
            outcome: AdvertiseOutcome::Failed(2),
        });

        assert_eq!(
            event,
            Some(AdvertisingEvent::Failed {
                handle,
                error: PlatformError::TooManyAdvertisers,
            })
        );
        assert_eq!(session.state(), AdvertisingState::Idle);
    }

    #[test]
    fn test_stale_event_ignored() {
        let session = session_with(accepting_mock());
        let first = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();
        let second = session.publish(&SensorReading::new(22.0, 40.0)).unwrap();

        let event = session.handle_event(AdvertiseEvent {
            handle: first,
            outcome: AdvertiseOutcome::Failed(4),
        });

        assert!(event.is_none());
        assert!(matches!(
            session.state(),
            AdvertisingState::Advertising { handle, .. } if handle == second
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let session = session_with(accepting_mock());
        assert!(!session.stop());

        let handle = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();
        assert!(session.stop());
        assert!(!session.stop());

        // Late confirmation for the stopped handle
        assert!(session
            .handle_event(AdvertiseEvent {
                handle,
                outcome: AdvertiseOutcome::Started,
            })
            .is_none());
        assert_eq!(session.state(), AdvertisingState::Idle);
    }

    #[test]
    fn test_listener_receives_events() {
        let session = session_with(accepting_mock());
        let (tx, mut rx) = mpsc::unbounded_channel::<AdvertisingEvent>();
        session.subscribe(Arc::new(tx));

        let handle = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();
        session.handle_event(AdvertiseEvent {
            handle,
            outcome: AdvertiseOutcome::Stopped,
        });

        assert_eq!(rx.try_recv().unwrap(), AdvertisingEvent::Stopped { handle });
        assert!(!session.is_advertising());

        session.unsubscribe();
        let handle = session.publish(&SensorReading::new(20.0, 40.0)).unwrap();
        session.handle_event(AdvertiseEvent {
            handle,
            outcome: AdvertiseOutcome::Started,
        });
        assert!(rx.try_recv().is_err());
    }
}

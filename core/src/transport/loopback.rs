//! In-process loopback radio
//!
//! Implements both platform traits without hardware: whatever is advertised
//! can be delivered to the running scan as if received over the air. Every
//! platform call is recorded, and start results are reported asynchronously
//! over a channel the way a real stack reports them through callbacks.

use super::abstraction::{
    AdvertiseEvent, AdvertiseOutcome, AdvertiseSettings, PlatformAdvertiser, PlatformScanner,
    ScanFailure, ScanFilter, ScanReport, ScanSettings, SessionHandle,
};
use super::ble::advertiser::AdvertisingSession;
use super::ble::scanner::ScanSession;
use crate::error::PlatformError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// `ADVERTISE_FAILED_ALREADY_STARTED`
const ADVERTISE_ALREADY_STARTED: i32 = 3;

/// A recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    StartAdvertising {
        handle: SessionHandle,
        data: Vec<u8>,
    },
    StopAdvertising(SessionHandle),
    StartScan {
        handle: SessionHandle,
        filters: Vec<ScanFilter>,
    },
    StopScan(SessionHandle),
}

/// Asynchronous result delivered by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    Advertise(AdvertiseEvent),
    Report(ScanReport),
    ScanFailed(ScanFailure),
}

#[derive(Debug, Default)]
struct RadioState {
    calls: Vec<RadioCall>,
    advertisement: Option<(SessionHandle, Vec<u8>)>,
    scan: Option<(SessionHandle, Vec<ScanFilter>)>,
    advertise_failure: Option<i32>,
    scan_failure: Option<i32>,
}

/// Loopback advertiser + scanner pair
pub struct LoopbackRadio {
    address: String,
    rssi: i8,
    state: Mutex<RadioState>,
    events: mpsc::UnboundedSender<RadioEvent>,
}

impl LoopbackRadio {
    /// Create a radio whose own advertisements are received from `address`
    /// at `rssi`. The receiver yields every asynchronous result.
    pub fn new(
        address: impl Into<String>,
        rssi: i8,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<RadioEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Self {
            address: address.into(),
            rssi,
            state: Mutex::new(RadioState::default()),
            events,
        });
        (radio, rx)
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<RadioCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Advertising data currently on air
    pub fn on_air(&self) -> Option<Vec<u8>> {
        self.state
            .lock()
            .advertisement
            .as_ref()
            .map(|(_, data)| data.clone())
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock().scan.is_some()
    }

    /// Make the next advertising start fail asynchronously with `code`
    pub fn fail_next_advertise(&self, code: i32) {
        self.state.lock().advertise_failure = Some(code);
    }

    /// Make the next scan start fail asynchronously with `code`
    pub fn fail_next_scan(&self, code: i32) {
        self.state.lock().scan_failure = Some(code);
    }

    /// Deliver the advertisement on air to the running scan.
    ///
    /// Returns `false` if nothing is on air, no scan runs, or the scan
    /// filters reject the advertisement.
    pub fn tick(&self) -> bool {
        let on_air = self
            .state
            .lock()
            .advertisement
            .as_ref()
            .map(|(_, data)| data.clone());

        match on_air {
            Some(data) => self.inject(&self.address, self.rssi, data),
            None => false,
        }
    }

    /// Deliver an arbitrary advertisement to the running scan, subject to
    /// its filters.
    pub fn inject(&self, address: &str, rssi: i8, data: Vec<u8>) -> bool {
        let state = self.state.lock();
        let Some((handle, filters)) = &state.scan else {
            return false;
        };

        // Platform filters are OR-ed; an empty list accepts everything
        if !filters.is_empty() && !filters.iter().any(|f| f.matches(&data)) {
            trace!("Loopback filtered advertisement from {}", address);
            return false;
        }

        self.emit(RadioEvent::Report(ScanReport {
            handle: *handle,
            address: address.to_string(),
            rssi,
            data,
        }));
        true
    }

    fn emit(&self, event: RadioEvent) {
        let _ = self.events.send(event);
    }
}

impl PlatformAdvertiser for LoopbackRadio {
    fn start_advertising(
        &self,
        handle: SessionHandle,
        _settings: &AdvertiseSettings,
        data: &[u8],
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::StartAdvertising {
            handle,
            data: data.to_vec(),
        });

        let outcome = if let Some(code) = state.advertise_failure.take() {
            AdvertiseOutcome::Failed(code)
        } else if state.advertisement.is_some() {
            AdvertiseOutcome::Failed(ADVERTISE_ALREADY_STARTED)
        } else {
            state.advertisement = Some((handle, data.to_vec()));
            AdvertiseOutcome::Started
        };

        self.emit(RadioEvent::Advertise(AdvertiseEvent { handle, outcome }));
        Ok(())
    }

    fn stop_advertising(&self, handle: SessionHandle) {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::StopAdvertising(handle));

        if matches!(&state.advertisement, Some((current, _)) if *current == handle) {
            state.advertisement = None;
            self.emit(RadioEvent::Advertise(AdvertiseEvent {
                handle,
                outcome: AdvertiseOutcome::Stopped,
            }));
        }
    }
}

impl PlatformScanner for LoopbackRadio {
    fn start_scan(
        &self,
        handle: SessionHandle,
        filters: &[ScanFilter],
        _settings: &ScanSettings,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::StartScan {
            handle,
            filters: filters.to_vec(),
        });

        if let Some(code) = state.scan_failure.take() {
            self.emit(RadioEvent::ScanFailed(ScanFailure { handle, code }));
        } else {
            state.scan = Some((handle, filters.to_vec()));
        }
        Ok(())
    }

    fn stop_scan(&self, handle: SessionHandle) {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::StopScan(handle));

        if matches!(&state.scan, Some((current, _)) if *current == handle) {
            state.scan = None;
        }
    }
}

/// Route one radio event to the session it belongs to
pub fn dispatch_event(event: RadioEvent, advertising: &AdvertisingSession, scanning: &ScanSession) {
    match event {
        RadioEvent::Advertise(event) => {
            advertising.handle_event(event);
        }
        RadioEvent::Report(report) => {
            scanning.handle_report(report);
        }
        RadioEvent::ScanFailed(failure) => {
            scanning.handle_failure(failure);
        }
    }
}

/// Forward radio events to the sessions until the radio is dropped
pub async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<RadioEvent>,
    advertising: Arc<AdvertisingSession>,
    scanning: Arc<ScanSession>,
) {
    while let Some(event) = rx.recv().await {
        dispatch_event(event, &advertising, &scanning);
    }
}

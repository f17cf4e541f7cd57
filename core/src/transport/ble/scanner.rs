/// BLE scan session with sensor beacon dispatch
///
/// This module owns "am I scanning, with which filter" and turns raw
/// advertisements into sensor observations. Most traffic nearby is not ours:
/// reports without our manufacturer data are skipped, and malformed or
/// foreign frames are logged and dropped, never surfaced as errors.

use super::ad::{find_local_name, find_manufacturer_data, APPLE_COMPANY_ID, IBEACON_PREFIX};
use super::beacon::BeaconFrame;
use super::distance::estimate_distance;
use crate::error::{CodecError, PlatformError, SessionError};
use crate::platform::{Permission, Permissions};
use crate::sensor::{SensorCodec, SensorObserved};
use crate::transport::abstraction::{
    PlatformScanner, ScanFailure, ScanFilter, ScanReport, ScanSettings, SessionHandle,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// What a scan looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilterConfig {
    /// Company id whose manufacturer data carries the beacon frame
    pub manufacturer_id: u16,
    /// Only accept advertisers with this local name
    pub device_name: Option<String>,
}

impl Default for ScanFilterConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: APPLE_COMPANY_ID,
            device_name: None,
        }
    }
}

impl ScanFilterConfig {
    /// Filters handed to the platform scanner
    pub fn to_platform_filters(&self) -> Vec<ScanFilter> {
        vec![ScanFilter {
            manufacturer_id: Some(self.manufacturer_id),
            manufacturer_data_prefix: IBEACON_PREFIX.to_vec(),
            device_name: self.device_name.clone(),
        }]
    }
}

/// Scanner state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerState {
    /// Idle, not scanning
    Idle,
    /// Scan requested under `handle`
    Scanning {
        handle: SessionHandle,
        filter: ScanFilterConfig,
    },
}

/// Result of [`ScanSession::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionHandle),
    /// A scan was already running; nothing changed
    AlreadyActive(SessionHandle),
}

/// Notifications emitted to the registered listener
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Observed(SensorObserved),
    /// The platform aborted the scan; the session is idle again
    Failed {
        handle: SessionHandle,
        error: PlatformError,
    },
}

/// Receives scan notifications
pub trait ScanListener: Send + Sync {
    fn on_scan_event(&self, event: ScanEvent);
}

impl ScanListener for mpsc::UnboundedSender<ScanEvent> {
    fn on_scan_event(&self, event: ScanEvent) {
        let _ = self.send(event);
    }
}

/// Counters for reports seen by a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub reports_seen: u64,
    pub sensors_observed: u64,
    /// No matching manufacturer data or name
    pub reports_ignored: u64,
    /// Manufacturer data present but not a valid sensor frame
    pub frames_rejected: u64,
}

/// Decode a raw report under `filter`.
///
/// `Ok(None)` means the report is not for us at all; `Err` means it carried
/// manufacturer data that is not a sensor frame.
pub fn decode_report(
    codec: &SensorCodec,
    filter: &ScanFilterConfig,
    report: &ScanReport,
) -> Result<Option<SensorObserved>, CodecError> {
    let Some(data) = find_manufacturer_data(&report.data, filter.manufacturer_id) else {
        return Ok(None);
    };

    if let Some(name) = &filter.device_name {
        if find_local_name(&report.data).as_deref() != Some(name.as_str()) {
            return Ok(None);
        }
    }

    let frame = BeaconFrame::parse(data)?;
    let reading = codec.decode(&frame)?;

    Ok(Some(SensorObserved {
        address: report.address.clone(),
        reading,
        rssi: report.rssi,
        measured_power: frame.measured_power,
        distance: estimate_distance(frame.measured_power, report.rssi),
    }))
}

/// Single-owner scan session over a platform scanner
pub struct ScanSession {
    codec: SensorCodec,
    settings: ScanSettings,
    scanner: Arc<dyn PlatformScanner>,
    permissions: Arc<dyn Permissions>,
    state: Mutex<ScannerState>,
    next_handle: AtomicU64,
    listener: RwLock<Option<Arc<dyn ScanListener>>>,
    stats: Mutex<ScanStats>,
}

impl ScanSession {
    /// Create an idle session
    pub fn new(
        codec: SensorCodec,
        settings: ScanSettings,
        scanner: Arc<dyn PlatformScanner>,
        permissions: Arc<dyn Permissions>,
    ) -> Self {
        Self {
            codec,
            settings,
            scanner,
            permissions,
            state: Mutex::new(ScannerState::Idle),
            next_handle: AtomicU64::new(1),
            listener: RwLock::new(None),
            stats: Mutex::new(ScanStats::default()),
        }
    }

    /// Get current scanner state
    pub fn state(&self) -> ScannerState {
        self.state.lock().clone()
    }

    pub fn is_scanning(&self) -> bool {
        matches!(*self.state.lock(), ScannerState::Scanning { .. })
    }

    pub fn stats(&self) -> ScanStats {
        *self.stats.lock()
    }

    /// Register the listener, replacing any previous one
    pub fn subscribe(&self, listener: Arc<dyn ScanListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Remove the listener
    pub fn unsubscribe(&self) {
        *self.listener.write() = None;
    }

    /// Start scanning with `filter`.
    ///
    /// A second start while scanning is a no-op that keeps the original
    /// filter and reports [`StartOutcome::AlreadyActive`].
    pub fn start(&self, filter: ScanFilterConfig) -> Result<StartOutcome, SessionError> {
        if !self.permissions.is_granted(Permission::BluetoothScan) {
            warn!("Scan refused: {} not granted", Permission::BluetoothScan);
            return Err(SessionError::PermissionDenied(Permission::BluetoothScan));
        }

        let mut state = self.state.lock();

        if let ScannerState::Scanning { handle, .. } = &*state {
            debug!("Already scanning under {}", handle);
            return Ok(StartOutcome::AlreadyActive(*handle));
        }

        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let filters = filter.to_platform_filters();

        self.scanner
            .start_scan(handle, &filters, &self.settings)
            .map_err(|e| {
                warn!("Scan {} refused by platform: {}", handle, e);
                SessionError::Platform(e)
            })?;

        info!(
            "Scan {} started for manufacturer 0x{:04X}",
            handle, filter.manufacturer_id
        );
        *state = ScannerState::Scanning { handle, filter };
        Ok(StartOutcome::Started(handle))
    }

    /// Stop scanning. Returns `false` if the session was already idle.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        match &*state {
            ScannerState::Scanning { handle, .. } => {
                let handle = *handle;
                self.scanner.stop_scan(handle);
                *state = ScannerState::Idle;
                info!("Scan {} stopped", handle);
                true
            }
            ScannerState::Idle => false,
        }
    }

    /// Dispatch one raw advertisement.
    ///
    /// Returns the observation emitted to the listener, if any.
    pub fn handle_report(&self, report: ScanReport) -> Option<SensorObserved> {
        let filter = match &*self.state.lock() {
            ScannerState::Scanning { handle, filter } if *handle == report.handle => {
                filter.clone()
            }
            _ => {
                trace!("Ignoring report for stale scan {}", report.handle);
                return None;
            }
        };

        self.stats.lock().reports_seen += 1;

        let observed = match decode_report(&self.codec, &filter, &report) {
            Ok(Some(observed)) => observed,
            Ok(None) => {
                self.stats.lock().reports_ignored += 1;
                return None;
            }
            Err(e) => {
                self.stats.lock().frames_rejected += 1;
                debug!("Dropping frame from {}: {}", report.address, e);
                return None;
            }
        };

        self.stats.lock().sensors_observed += 1;
        debug!(
            "Sensor {} rssi={} distance={:.2}m: {}",
            observed.address, observed.rssi, observed.distance, observed.reading
        );

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_scan_event(ScanEvent::Observed(observed.clone()));
        }
        Some(observed)
    }

    /// Dispatch a batch of reports delivered together
    pub fn handle_batch(&self, reports: Vec<ScanReport>) -> Vec<SensorObserved> {
        reports
            .into_iter()
            .filter_map(|report| self.handle_report(report))
            .collect()
    }

    /// Apply an asynchronous scan failure.
    ///
    /// Failures for any handle other than the current one are ignored.
    pub fn handle_failure(&self, failure: ScanFailure) -> Option<PlatformError> {
        let error = {
            let mut state = self.state.lock();
            match &*state {
                ScannerState::Scanning { handle, .. } if *handle == failure.handle => {}
                _ => {
                    debug!("Ignoring stale scan failure for {}", failure.handle);
                    return None;
                }
            }
            *state = ScannerState::Idle;
            PlatformError::from_scan_code(failure.code)
        };

        warn!(
            "Scan {} failed (code {}): {}",
            failure.handle, failure.code, error
        );

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_scan_event(ScanEvent::Failed {
                handle: failure.handle,
                error,
            });
        }
        Some(error)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let ScannerState::Scanning { handle, .. } = self.state.get_mut() {
            self.scanner.stop_scan(*handle);
        }
    }
}

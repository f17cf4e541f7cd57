// Error taxonomy shared by the codecs and the advertising/scanning sessions.
//
// Nothing here is fatal: codec errors mean "skip this frame", platform and
// session errors mean "this session is idle until the caller retries".

use crate::platform::Permission;
use thiserror::Error;

// ============================================================================
// CODEC ERRORS
// ============================================================================

/// Errors produced while parsing or decoding beacon payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Beacon frame too short: {len} bytes (need 23)")]
    TooShort { len: usize },
    #[error("Not an iBeacon frame: marker {found:02x?}")]
    BadMarker { found: [u8; 2] },
    #[error("Proximity UUID {found} does not belong to a sensor beacon")]
    UuidMismatch { found: String },
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// PLATFORM ERRORS
// ============================================================================

/// Failure classes reported by the platform advertiser or scanner.
///
/// Android reports these as small integer codes through its callback objects;
/// [`PlatformError::from_advertise_code`] and [`PlatformError::from_scan_code`]
/// map the two (overlapping) code spaces onto one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Operation already started")]
    AlreadyStarted,
    #[error("Advertising data too large")]
    DataTooLarge,
    #[error("Feature unsupported by this controller")]
    FeatureUnsupported,
    #[error("Internal platform error")]
    InternalError,
    #[error("Too many advertisers")]
    TooManyAdvertisers,
    #[error("Out of hardware resources")]
    OutOfHardwareResources,
    #[error("Scanning too frequently")]
    ScanningTooFrequently,
    #[error("Application registration failed")]
    ApplicationRegistrationFailed,
    #[error("Unknown platform error code {0}")]
    Unknown(i32),
}

impl PlatformError {
    /// Classify an `AdvertiseCallback.onStartFailure` error code.
    pub fn from_advertise_code(code: i32) -> Self {
        match code {
            1 => PlatformError::DataTooLarge,
            2 => PlatformError::TooManyAdvertisers,
            3 => PlatformError::AlreadyStarted,
            4 => PlatformError::InternalError,
            5 => PlatformError::FeatureUnsupported,
            other => PlatformError::Unknown(other),
        }
    }

    /// Classify a `ScanCallback.onScanFailed` error code.
    pub fn from_scan_code(code: i32) -> Self {
        match code {
            1 => PlatformError::AlreadyStarted,
            2 => PlatformError::ApplicationRegistrationFailed,
            3 => PlatformError::InternalError,
            4 => PlatformError::FeatureUnsupported,
            5 => PlatformError::OutOfHardwareResources,
            6 => PlatformError::ScanningTooFrequently,
            other => PlatformError::Unknown(other),
        }
    }
}

// ============================================================================
// SESSION ERRORS
// ============================================================================

/// Errors returned by the advertising and scanning sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Refused before any platform call was attempted.
    #[error("Permission denied: {0}")]
    PermissionDenied(Permission),
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid sensor UUID: {0}")]
    Uuid(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertise_codes_classified() {
        assert_eq!(PlatformError::from_advertise_code(1), PlatformError::DataTooLarge);
        assert_eq!(
            PlatformError::from_advertise_code(2),
            PlatformError::TooManyAdvertisers
        );
        assert_eq!(PlatformError::from_advertise_code(3), PlatformError::AlreadyStarted);
        assert_eq!(PlatformError::from_advertise_code(4), PlatformError::InternalError);
        assert_eq!(
            PlatformError::from_advertise_code(5),
            PlatformError::FeatureUnsupported
        );
        assert_eq!(PlatformError::from_advertise_code(42), PlatformError::Unknown(42));
    }

    #[test]
    fn test_scan_codes_classified() {
        assert_eq!(PlatformError::from_scan_code(1), PlatformError::AlreadyStarted);
        assert_eq!(
            PlatformError::from_scan_code(2),
            PlatformError::ApplicationRegistrationFailed
        );
        assert_eq!(PlatformError::from_scan_code(3), PlatformError::InternalError);
        assert_eq!(PlatformError::from_scan_code(4), PlatformError::FeatureUnsupported);
        assert_eq!(
            PlatformError::from_scan_code(5),
            PlatformError::OutOfHardwareResources
        );
        assert_eq!(
            PlatformError::from_scan_code(6),
            PlatformError::ScanningTooFrequently
        );
        assert_eq!(PlatformError::from_scan_code(0), PlatformError::Unknown(0));
    }

    #[test]
    fn test_session_error_wraps_platform_error() {
        let err: SessionError = PlatformError::DataTooLarge.into();
        assert_eq!(err, SessionError::Platform(PlatformError::DataTooLarge));
        assert!(err.to_string().contains("too large"));
    }
}

//! Platform integration layer
//!
//! This module provides:
//! - Runtime permission gate consulted before any radio request
//! - Beacon configuration persistence and validation

pub mod settings;

pub use settings::BeaconConfig;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Runtime permissions guarding the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    BluetoothAdvertise,
    BluetoothScan,
    /// Required for scan results on older Android releases
    FineLocation,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::BluetoothAdvertise => write!(f, "BLUETOOTH_ADVERTISE"),
            Permission::BluetoothScan => write!(f, "BLUETOOTH_SCAN"),
            Permission::FineLocation => write!(f, "ACCESS_FINE_LOCATION"),
        }
    }
}

/// Answers whether a permission is currently granted.
///
/// Implemented by the platform layer; the sessions never prompt, they only
/// refuse to start when a grant is missing.
pub trait Permissions: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// Every permission granted, for desktops and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AllGranted;

impl Permissions for AllGranted {
    fn is_granted(&self, _permission: Permission) -> bool {
        true
    }
}

/// Mutable grant set, mirroring a user toggling permissions at runtime
#[derive(Debug, Default)]
pub struct GrantedPermissions {
    granted: RwLock<HashSet<Permission>>,
}

impl GrantedPermissions {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            granted: RwLock::new(granted.into_iter().collect()),
        }
    }

    pub fn grant(&self, permission: Permission) {
        self.granted.write().insert(permission);
    }

    pub fn revoke(&self, permission: Permission) {
        self.granted.write().remove(&permission);
    }
}

impl Permissions for GrantedPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        self.granted.read().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_granted() {
        assert!(AllGranted.is_granted(Permission::BluetoothScan));
        assert!(AllGranted.is_granted(Permission::BluetoothAdvertise));
    }

    #[test]
    fn test_grant_and_revoke() {
        let permissions = GrantedPermissions::new([Permission::BluetoothScan]);
        assert!(permissions.is_granted(Permission::BluetoothScan));
        assert!(!permissions.is_granted(Permission::BluetoothAdvertise));

        permissions.grant(Permission::BluetoothAdvertise);
        assert!(permissions.is_granted(Permission::BluetoothAdvertise));

        permissions.revoke(Permission::BluetoothScan);
        assert!(!permissions.is_granted(Permission::BluetoothScan));
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(Permission::BluetoothScan.to_string(), "BLUETOOTH_SCAN");
    }
}

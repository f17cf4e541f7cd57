/// Advertising data (AD) structure framing
///
/// Legacy advertising data is a sequence of `[len][type][data...]` entries
/// where `len` counts the type byte plus data, capped at 31 bytes total.
/// The beacon frame travels inside a manufacturer specific entry (type
/// 0xFF) whose first two data bytes are the little-endian company id.

use crate::error::PlatformError;

/// Maximum legacy advertising data size
pub const MAX_ADVERTISING_DATA: usize = 31;

/// Bluetooth SIG company identifier for Apple, used by iBeacon
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Leading bytes of every iBeacon manufacturer payload
pub const IBEACON_PREFIX: [u8; 2] = [0x02, 0x15];

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// LE General Discoverable, BR/EDR not supported
const DEFAULT_FLAGS: u8 = 0x06;

/// One AD entry borrowed from a raw advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterate the AD entries of a raw advertisement.
///
/// Zero-length entries are padding and skipped; a truncated trailing entry
/// ends iteration.
pub fn parse_ad_structures(raw: &[u8]) -> Vec<AdStructure<'_>> {
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < raw.len() {
        let len = raw[i] as usize;
        i += 1;
        if len == 0 {
            continue;
        }
        if i + len > raw.len() {
            break;
        }
        entries.push(AdStructure {
            ad_type: raw[i],
            data: &raw[i + 1..i + len],
        });
        i += len;
    }

    entries
}

/// Manufacturer specific data for `company_id`, without the company id bytes.
pub fn find_manufacturer_data(raw: &[u8], company_id: u16) -> Option<&[u8]> {
    parse_ad_structures(raw)
        .into_iter()
        .filter(|entry| entry.ad_type == AD_TYPE_MANUFACTURER_DATA && entry.data.len() >= 2)
        .find(|entry| u16::from_le_bytes([entry.data[0], entry.data[1]]) == company_id)
        .map(|entry| &entry.data[2..])
}

/// Complete or shortened local name, if present and valid UTF-8.
pub fn find_local_name(raw: &[u8]) -> Option<String> {
    parse_ad_structures(raw)
        .into_iter()
        .find(|entry| {
            entry.ad_type == AD_TYPE_COMPLETE_LOCAL_NAME
                || entry.ad_type == AD_TYPE_SHORT_LOCAL_NAME
        })
        .and_then(|entry| std::str::from_utf8(entry.data).ok().map(str::to_string))
}

/// Contents of one advertisement, assembled before handing it to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisePayload {
    /// Local name to include, `None` to save packet space
    pub device_name: Option<String>,
    /// TX power level to include, `None` to omit
    pub tx_power_level: Option<i8>,
    pub manufacturer_id: u16,
    pub manufacturer_data: Vec<u8>,
}

impl AdvertisePayload {
    /// Payload carrying iBeacon manufacturer data and nothing else.
    pub fn ibeacon(frame_bytes: &[u8]) -> Self {
        Self {
            device_name: None,
            tx_power_level: None,
            manufacturer_id: APPLE_COMPANY_ID,
            manufacturer_data: frame_bytes.to_vec(),
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_tx_power_level(mut self, level: i8) -> Self {
        self.tx_power_level = Some(level);
        self
    }

    /// Serialize to AD structures, rejecting anything over 31 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PlatformError> {
        let mut out = Vec::with_capacity(MAX_ADVERTISING_DATA);

        push_entry(&mut out, AD_TYPE_FLAGS, &[DEFAULT_FLAGS])?;

        if let Some(name) = &self.device_name {
            push_entry(&mut out, AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes())?;
        }

        if let Some(level) = self.tx_power_level {
            push_entry(&mut out, AD_TYPE_TX_POWER_LEVEL, &[level as u8])?;
        }

        let mut manufacturer = Vec::with_capacity(2 + self.manufacturer_data.len());
        manufacturer.extend_from_slice(&self.manufacturer_id.to_le_bytes());
        manufacturer.extend_from_slice(&self.manufacturer_data);
        push_entry(&mut out, AD_TYPE_MANUFACTURER_DATA, &manufacturer)?;

        if out.len() > MAX_ADVERTISING_DATA {
            return Err(PlatformError::DataTooLarge);
        }
        Ok(out)
    }
}

fn push_entry(out: &mut Vec<u8>, ad_type: u8, data: &[u8]) -> Result<(), PlatformError> {
    // len byte covers the type byte plus data
    let len = u8::try_from(data.len() + 1).map_err(|_| PlatformError::DataTooLarge)?;
    out.push(len);
    out.push(ad_type);
    out.extend_from_slice(data);
    Ok(())
}

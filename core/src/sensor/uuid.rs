// Proximity UUID codec: 16 raw bytes <-> canonical 8-4-4-4-12 hex string

use crate::error::CodecError;

/// Proximity UUID shared by every sensor beacon of this application.
pub const SENSOR_UUID: &str = "6ef0e30d-7308-4458-b62e-f706c692ca77";

/// Parse 32 hex digits, with dashes allowed anywhere, into raw UUID bytes.
pub fn parse_uuid(text: &str) -> Result<[u8; 16], CodecError> {
    let digits: String = text.chars().filter(|c| *c != '-').collect();

    if digits.len() != 32 {
        return Err(CodecError::InvalidFormat(format!(
            "expected 32 hex digits, got {}",
            digits.len()
        )));
    }

    let mut bytes = [0u8; 16];
    hex::decode_to_slice(&digits, &mut bytes)
        .map_err(|e| CodecError::InvalidFormat(e.to_string()))?;
    Ok(bytes)
}

/// Format raw UUID bytes as lowercase `8-4-4-4-12`.
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    ::uuid::Uuid::from_bytes(*bytes).hyphenated().to_string()
}

/// Canonical form of a UUID string, or an error if it does not parse.
pub fn normalize_uuid(text: &str) -> Result<String, CodecError> {
    parse_uuid(text).map(|bytes| format_uuid(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_uuid() {
        let bytes = parse_uuid(SENSOR_UUID).expect("sensor UUID parses");
        assert_eq!(bytes[0], 0x6e);
        assert_eq!(bytes[15], 0x77);
    }

    #[test]
    fn test_parse_without_dashes() {
        let dashed = parse_uuid(SENSOR_UUID).unwrap();
        let plain = parse_uuid("6ef0e30d73084458b62ef706c692ca77").unwrap();
        assert_eq!(dashed, plain);
    }

    #[test]
    fn test_parse_uppercase() {
        let upper = parse_uuid("6EF0E30D-7308-4458-B62E-F706C692CA77").unwrap();
        assert_eq!(format_uuid(&upper), SENSOR_UUID);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        let result = parse_uuid("6ef0e30d-7308-4458");
        assert!(matches!(result, Err(CodecError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let result = parse_uuid("zzf0e30d-7308-4458-b62e-f706c692ca77");
        assert!(matches!(result, Err(CodecError::InvalidFormat(_))));
    }

    #[test]
    fn test_format_groups() {
        let formatted = format_uuid(&[0xAB; 16]);
        assert_eq!(formatted, "abababab-abab-abab-abab-abababababab");
    }

    #[test]
    fn test_normalize_odd_dash_placement() {
        let normalized = normalize_uuid("6ef0-e30d7308-4458b62e-f706c692ca77").unwrap();
        assert_eq!(normalized, SENSOR_UUID);
    }
}

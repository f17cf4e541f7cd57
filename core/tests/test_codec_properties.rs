// Property tests for the UUID, frame and sensor codecs

use proptest::prelude::*;
use sensorbeacon_core::sensor::{format_uuid, normalize_uuid, parse_uuid};
use sensorbeacon_core::transport::ble::FRAME_SIZE;
use sensorbeacon_core::{BeaconFrame, CodecError, SensorCodec, SensorReading};

fn uuid_text() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
}

proptest! {
    #[test]
    fn uuid_bytes_survive_formatting(bytes in any::<[u8; 16]>()) {
        let text = format_uuid(&bytes);
        prop_assert_eq!(text.len(), 36);
        prop_assert_eq!(parse_uuid(&text).unwrap(), bytes);
    }

    #[test]
    fn uuid_text_formats_to_lowercase(text in uuid_text()) {
        let bytes = parse_uuid(&text).unwrap();
        prop_assert_eq!(format_uuid(&bytes), text.to_lowercase());
        prop_assert_eq!(normalize_uuid(&text).unwrap(), text.to_lowercase());
    }

    #[test]
    fn frame_parses_what_it_serializes(
        proximity_uuid in any::<[u8; 16]>(),
        major in any::<u16>(),
        minor in any::<u16>(),
        measured_power in any::<i8>(),
    ) {
        let frame = BeaconFrame { proximity_uuid, major, minor, measured_power };
        let bytes = frame.serialize();
        prop_assert_eq!(&bytes[..2], &[0x02u8, 0x15][..]);
        prop_assert_eq!(BeaconFrame::parse(&bytes).unwrap(), frame);
    }

    #[test]
    fn short_input_is_too_short(bytes in prop::collection::vec(any::<u8>(), 0..FRAME_SIZE)) {
        let len = bytes.len();
        prop_assert_eq!(BeaconFrame::parse(&bytes), Err(CodecError::TooShort { len }));
    }

    #[test]
    fn reading_within_range_decodes_within_half_step(
        temperature in 0.0f32..6553.5,
        humidity in 0.0f32..6553.5,
    ) {
        let codec = SensorCodec::default();
        let reading = SensorReading::new(temperature, humidity);
        let decoded = codec.decode(&codec.encode(&reading)).unwrap();

        prop_assert!((decoded.temperature - temperature).abs() <= 0.05 + 1e-3);
        prop_assert!((decoded.humidity - humidity).abs() <= 0.05 + 1e-3);
    }

    #[test]
    fn foreign_uuid_never_decodes(uuid in any::<[u8; 16]>()) {
        let ours = SensorCodec::default();
        prop_assume!(&uuid != ours.sensor_uuid());

        let frame = SensorCodec::new(uuid, -59).encode(&SensorReading::new(21.0, 50.0));
        let rejected = matches!(ours.decode(&frame), Err(CodecError::UuidMismatch { .. }));
        prop_assert!(rejected);
    }
}

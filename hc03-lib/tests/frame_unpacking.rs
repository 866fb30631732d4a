//! Tests for frame classification, checksum validation and head/tail reassembly

mod common;

use common::*;
use hc03_lib::checksum::{frame_checksum, header_checksum};
use hc03_lib::constants::{FULL_PACKAGE_MAX_DATA_SIZE, MIN_FRAME_SIZE};

#[test]
fn test_short_buffers_never_touch_cache() {
    let mut unpacker = Unpacker::new();
    let content: Vec<u8> = (0..24).collect();
    let (head, _) = split_frame(&encode_response(0x84, &content), 10);
    unpacker.unpack(&head).unwrap();
    let pending = unpacker.cache().pending().cloned();

    for len in 0..MIN_FRAME_SIZE {
        let buf = vec![0x02; len];
        match unpacker.unpack(&buf) {
            Err(FrameError::TooShort { expected, actual }) => {
                assert_eq!(expected, MIN_FRAME_SIZE);
                assert_eq!(actual, len);
            }
            other => panic!("len {}: expected TooShort, got {:?}", len, other),
        }
        assert_eq!(unpacker.cache().pending().cloned(), pending, "len {}", len);
    }
}

#[test]
fn test_full_frame_payload_is_exact_content() {
    let mut unpacker = Unpacker::new();
    for len in 0..=FULL_PACKAGE_MAX_DATA_SIZE {
        let content: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37)).collect();
        let frame = encode_response(0x82, &content);
        assert_eq!(
            unpacker.unpack(&frame).unwrap(),
            Unpacked::Accepted(OriginData::new(0x82, content.clone())),
            "content length {}",
            len
        );
    }
    assert!(unpacker.cache().is_empty());
}

#[test]
fn test_captured_battery_frame() {
    let mut unpacker = Unpacker::new();
    let frame = hex_to_bytes(BATTERY_QUERY_FRAME);
    match unpacker.unpack(&frame).unwrap() {
        Unpacked::Accepted(origin) => {
            assert_eq!(origin.kind(), Some(SensorKind::Battery));
            assert_eq!(origin.payload.as_ref(), &[0x00, 0x1F, 0xFF]);
        }
        other => panic!("expected Accepted, got {:?}", other),
    }
}

#[test]
fn test_single_bit_checksum_corruption_is_rejected() {
    let frame = encode_response(0x8F, &[0x00, 0x1F, 0xFF]);
    let header_crc_index = 5;
    let tail_crc_indices = [frame.len() - 3, frame.len() - 2];

    for index in std::iter::once(header_crc_index).chain(tail_crc_indices) {
        for bit in 0..8 {
            let mut corrupted = frame.to_vec();
            corrupted[index] ^= 1 << bit;
            let mut unpacker = Unpacker::new();
            assert!(
                unpacker.unpack(&corrupted).is_err(),
                "byte {} bit {} accepted",
                index,
                bit
            );
            assert!(unpacker.cache().is_empty());
        }
    }
}

#[test]
fn test_head_then_tail_yields_one_frame() {
    let mut unpacker = Unpacker::new();
    let content: Vec<u8> = (100..130).collect();
    let (head, tail) = split_frame(&encode_response(0x84, &content), 12);

    assert_eq!(unpacker.unpack(&head).unwrap(), Unpacked::Buffered);
    let accepted = unpacker.unpack(&tail).unwrap();
    assert_eq!(accepted, Unpacked::Accepted(OriginData::new(0x84, content)));

    let stats = unpacker.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.rejected, 0);
}

#[test]
fn test_second_head_replaces_first() {
    let mut unpacker = Unpacker::new();
    let first: Vec<u8> = vec![0x11; 20];
    let second: Vec<u8> = vec![0x22; 24];
    let (head_a, tail_a) = split_frame(&encode_response(0x84, &first), 8);
    let (head_b, tail_b) = split_frame(&encode_response(0x81, &second), 8);

    unpacker.unpack(&head_a).unwrap();
    unpacker.unpack(&head_b).unwrap();
    assert_eq!(unpacker.cache().pending().map(|p| p.sensor_type), Some(0x81));

    // The first frame's tail now fails against the second head.
    assert!(matches!(unpacker.unpack(&tail_a), Err(FrameError::TailChecksum { .. })));
    assert!(unpacker.cache().is_empty());

    unpacker.unpack(&head_b).unwrap();
    assert_eq!(
        unpacker.unpack(&tail_b).unwrap(),
        Unpacked::Accepted(OriginData::new(0x81, second))
    );
}

#[test]
fn test_tail_without_head_is_rejected() {
    let mut unpacker = Unpacker::new();
    let content: Vec<u8> = (0..20).collect();
    let (_, tail) = split_frame(&encode_response(0x84, &content), 8);

    assert_eq!(unpacker.unpack(&tail), Err(FrameError::MissingHead));
    assert!(unpacker.cache().is_empty());
    assert_eq!(unpacker.stats().rejected, 1);
}

#[test]
fn test_length_mismatch_is_tolerated() {
    let mut unpacker = Unpacker::new();
    let content: Vec<u8> = (0..20).collect();
    let frame = encode_response(0x84, &content);
    let (head, tail) = split_frame(&frame, 8);

    // Drop one content byte from the tail and re-checksum what remains.
    let mut rebuilt = head.to_vec();
    rebuilt.extend_from_slice(&tail[1..tail.len() - 3]);
    let crc = frame_checksum(&rebuilt);
    let mut short_tail = tail[1..tail.len() - 3].to_vec();
    short_tail.extend_from_slice(&crc.to_le_bytes());
    short_tail.push(0xFF);

    unpacker.unpack(&head).unwrap();
    match unpacker.unpack(&short_tail).unwrap() {
        Unpacked::Accepted(origin) => assert_eq!(origin.payload.len(), 19),
        other => panic!("expected Accepted, got {:?}", other),
    }
    assert_eq!(unpacker.stats().length_mismatches, 1);
}

#[test]
fn test_request_frames_are_not_heads() {
    let mut unpacker = Unpacker::new();
    let frame = hc03_lib::frame::encode_request(0x8F, &[0x00]);
    assert!(unpacker.unpack(&frame).is_err());
    assert!(unpacker.cache().is_empty());
}

#[test]
fn test_checksums_are_deterministic() {
    let data = hex_to_bytes("0214000484968f0a1b2c3d4e");
    assert_eq!(frame_checksum(&data), frame_checksum(&data));
    assert_eq!(header_checksum(&data[..5]), header_checksum(&data[..5]));
    assert_eq!(frame_checksum(&[]), 0xFFFF);
}

#[test]
fn test_corrupt_full_frame_drops_pending_head() {
    let mut unpacker = Unpacker::new();
    let content: Vec<u8> = (0..20).collect();
    let (head, tail) = split_frame(&encode_response(0x84, &content), 8);
    unpacker.unpack(&head).unwrap();
    assert!(!unpacker.cache().is_empty());

    let mut corrupted = hex_to_bytes(BATTERY_QUERY_FRAME).to_vec();
    let crc_index = corrupted.len() - 3;
    corrupted[crc_index] ^= 0x01;
    assert!(matches!(unpacker.unpack(&corrupted), Err(FrameError::TailChecksum { .. })));
    assert!(unpacker.cache().is_empty());

    // The stale head is gone, so its tail has nothing to join.
    assert_eq!(unpacker.unpack(&tail), Err(FrameError::MissingHead));
}

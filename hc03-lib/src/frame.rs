//! HC03 frame layout.
//!
//! ```text
//! [START, LEN_lo, LEN_hi, BT_EDITION, TYPE, HEADER_CRC, CONTENT.., CRC_lo, CRC_hi, END]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::checksum::{frame_checksum, header_checksum};
use crate::constants::{
    ATTR_END, ATTR_START_REQ, ATTR_START_RES, BT_EDITION, HEADER_SIZE, INDEX_HEADER_CRC, TRAILER_SIZE,
};
use crate::sensor::SensorKind;

/// The fixed 6-byte header at the front of every head or full frame.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    pub start: u8,
    pub length: U16,
    pub bt_edition: u8,
    pub sensor_type: u8,
    pub header_crc: u8,
}

impl FrameHeader {
    pub fn new(start: u8, sensor_type: u8, length: u16) -> Self {
        let mut header = FrameHeader {
            start,
            length: U16::new(length),
            bt_edition: BT_EDITION,
            sensor_type,
            header_crc: 0,
        };
        header.header_crc = header.expected_crc();
        header
    }

    /// Reads the header from the front of `bytes`; `None` if fewer than 6 bytes.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        FrameHeader::read_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    pub fn content_len(&self) -> usize {
        self.length.get() as usize
    }

    /// Checksum computed over START..HEADER_CRC.
    pub fn expected_crc(&self) -> u8 {
        header_checksum(&self.as_bytes()[..INDEX_HEADER_CRC])
    }

    pub fn crc_matches(&self) -> bool {
        self.header_crc == self.expected_crc()
    }

    /// START and BT_EDITION carry the response markers.
    pub fn is_response(&self) -> bool {
        self.start == ATTR_START_RES && self.bt_edition == BT_EDITION
    }

    /// Response markers and a correct header checksum: this buffer opens a frame.
    pub fn is_valid_head(&self) -> bool {
        self.is_response() && self.crc_matches()
    }
}

/// A validated `(sensor_type, payload)` pair produced by the unpacker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginData {
    pub sensor_type: u8,
    pub payload: Bytes,
}

impl OriginData {
    pub fn new(sensor_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sensor_type,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> Option<SensorKind> {
        SensorKind::from_type_code(self.sensor_type)
    }
}

/// Builds a complete frame with both checksums and the end marker.
///
/// Content longer than `u16::MAX` is truncated to fit the length field.
pub fn encode_frame(start: u8, sensor_type: u8, content: &[u8]) -> Bytes {
    let content = &content[..content.len().min(u16::MAX as usize)];
    let header = FrameHeader::new(start, sensor_type, content.len() as u16);

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + content.len() + TRAILER_SIZE);
    buf.put_slice(header.as_bytes());
    buf.put_slice(content);
    let crc = frame_checksum(&buf);
    buf.put_u16_le(crc);
    buf.put_u8(ATTR_END);
    buf.freeze()
}

/// A host-to-device request frame.
pub fn encode_request(sensor_type: u8, content: &[u8]) -> Bytes {
    encode_frame(ATTR_START_REQ, sensor_type, content)
}

/// A device-to-host response frame, the shape the unpacker accepts.
pub fn encode_response(sensor_type: u8, content: &[u8]) -> Bytes {
    encode_frame(ATTR_START_RES, sensor_type, content)
}

/// Cuts an encoded frame into a head fragment carrying the header and the
/// first `head_content_len` content bytes, and a tail fragment with the rest
/// of the content, the frame checksum and the end marker.
pub fn split_frame(frame: &Bytes, head_content_len: usize) -> (Bytes, Bytes) {
    let cut = (HEADER_SIZE + head_content_len).min(frame.len());
    (frame.slice(..cut), frame.slice(cut..))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BATTERY_RES_TYPE;

    #[test]
    fn encode_matches_device_capture() {
        let frame = encode_response(BATTERY_RES_TYPE, &[0x00, 0x1F, 0xFF]);
        assert_eq!(hex::encode(&frame), "020300048f8a001fffc6efff");
    }

    #[test]
    fn header_parse() {
        let frame = encode_response(0x84, &[0u8; 20]);
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.content_len(), 20);
        assert_eq!(header.sensor_type, 0x84);
        assert!(header.is_valid_head());

        assert!(FrameHeader::parse(&frame[..5]).is_none());
    }

    #[test]
    fn request_frames_are_not_response_heads() {
        let frame = encode_request(0x84, &[0x01]);
        let header = FrameHeader::parse(&frame).unwrap();
        assert!(header.crc_matches());
        assert!(!header.is_valid_head());
    }

    #[test]
    fn split_keeps_every_byte() {
        let frame = encode_response(0x84, &[7u8; 20]);
        let (head, tail) = split_frame(&frame, 12);
        assert_eq!(head.len(), HEADER_SIZE + 12);
        assert_eq!(tail.len(), 8 + TRAILER_SIZE);
        assert_eq!([head.as_ref(), tail.as_ref()].concat(), frame.to_vec());
    }
}

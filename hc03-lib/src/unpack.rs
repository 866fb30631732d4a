//! Classifies incoming notification buffers as full frames, head fragments or
//! tail fragments, and reassembles head/tail pairs.
//!
//! There is no explicit more-fragments flag on the wire. A buffer whose header
//! carries the response markers and a correct header checksum is either a full
//! frame (content fits in [`FULL_PACKAGE_MAX_DATA_SIZE`]) or a head fragment
//! (content longer than that). Anything else is assumed to be the tail of the
//! pending head.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, warn};

use crate::checksum::frame_checksum;
use crate::constants::{FULL_PACKAGE_MAX_DATA_SIZE, HEADER_SIZE, MIN_FRAME_SIZE, TAIL_CRC_SIZE, TRAILER_SIZE};
use crate::error::FrameError;
use crate::frame::{FrameHeader, OriginData};
use crate::reassembly::ReassemblyCache;

/// Outcome of feeding one buffer to the [`Unpacker`]. Rejection is the `Err` side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unpacked {
    /// A full frame, or a head/tail pair, validated end to end.
    Accepted(OriginData),
    /// A head fragment was cached; its tail is still to come.
    Buffered,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnpackStats {
    pub accepted: u64,
    pub buffered: u64,
    pub rejected: u64,
    /// Reassembled frames whose combined content length disagreed with the head's LENGTH.
    pub length_mismatches: u64,
}

#[derive(Debug, Default)]
pub struct Unpacker {
    cache: ReassemblyCache,
    stats: UnpackStats,
}

impl Unpacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unpack(&mut self, raw: &[u8]) -> Result<Unpacked, FrameError> {
        let result = self.classify(raw);
        match &result {
            Ok(Unpacked::Accepted(origin)) => {
                self.stats.accepted += 1;
                debug!(
                    sensor_type = format_args!("{:#04x}", origin.sensor_type),
                    len = origin.payload.len(),
                    "Frame accepted"
                );
            }
            Ok(Unpacked::Buffered) => {
                self.stats.buffered += 1;
                debug!("Head fragment buffered");
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(class = e.class(), raw = %hex::encode(raw), "Frame rejected: {}", e);
            }
        }
        result
    }

    fn classify(&mut self, raw: &[u8]) -> Result<Unpacked, FrameError> {
        let too_short = FrameError::TooShort {
            expected: MIN_FRAME_SIZE,
            actual: raw.len(),
        };
        if raw.len() < MIN_FRAME_SIZE {
            return Err(too_short);
        }
        let header = FrameHeader::parse(raw).ok_or(too_short)?;

        if header.is_valid_head() {
            if header.content_len() <= FULL_PACKAGE_MAX_DATA_SIZE {
                let result = Self::full_frame(raw, &header);
                if matches!(result, Err(FrameError::TailChecksum { .. })) {
                    self.cache.clear();
                }
                return result;
            }
            self.cache.store(header.sensor_type, Bytes::copy_from_slice(raw));
            return Ok(Unpacked::Buffered);
        }

        self.tail_fragment(raw, &header)
    }

    fn full_frame(raw: &[u8], header: &FrameHeader) -> Result<Unpacked, FrameError> {
        let content_end = HEADER_SIZE + header.content_len();
        let needed = content_end + TAIL_CRC_SIZE;
        if raw.len() < needed {
            return Err(FrameError::Truncated {
                expected: needed,
                actual: raw.len(),
            });
        }

        let expected = u16::from_le_bytes([raw[content_end], raw[content_end + 1]]);
        let actual = frame_checksum(&raw[..content_end]);
        if expected != actual {
            return Err(FrameError::TailChecksum { expected, actual });
        }

        Ok(Unpacked::Accepted(OriginData::new(
            header.sensor_type,
            Bytes::copy_from_slice(&raw[HEADER_SIZE..content_end]),
        )))
    }

    /// `raw` is trailing content, the frame checksum and the end marker.
    /// The cache is empty afterwards whatever the outcome.
    fn tail_fragment(&mut self, raw: &[u8], header: &FrameHeader) -> Result<Unpacked, FrameError> {
        let Some(pending) = self.cache.take() else {
            if header.is_response() {
                return Err(FrameError::HeaderChecksum {
                    expected: header.expected_crc(),
                    actual: header.header_crc,
                });
            }
            return Err(FrameError::MissingHead);
        };
        let Some(head) = FrameHeader::parse(&pending.raw_head) else {
            return Err(FrameError::MissingHead);
        };

        let content_end = raw.len() - TRAILER_SIZE;
        let mut frame = BytesMut::with_capacity(pending.raw_head.len() + content_end);
        frame.put_slice(&pending.raw_head);
        frame.put_slice(&raw[..content_end]);

        let combined_len = frame.len() - HEADER_SIZE;
        if combined_len != head.content_len() {
            // Tolerated: observed devices occasionally disagree with their own LENGTH.
            self.stats.length_mismatches += 1;
            warn!(
                announced = head.content_len(),
                combined = combined_len,
                "Reassembled content length mismatch"
            );
        }

        let expected = u16::from_le_bytes([raw[content_end], raw[content_end + 1]]);
        let actual = frame_checksum(&frame);
        if expected != actual {
            return Err(FrameError::TailChecksum { expected, actual });
        }

        let payload = frame.freeze().slice(HEADER_SIZE..);
        Ok(Unpacked::Accepted(OriginData::new(pending.sensor_type, payload)))
    }

    /// Drops any pending head fragment.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ReassemblyCache {
        &self.cache
    }

    pub fn stats(&self) -> UnpackStats {
        self.stats
    }
}

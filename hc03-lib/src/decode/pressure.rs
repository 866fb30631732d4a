use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::validate_structured;
use crate::constants::{BP_STRUCTURED_COMMAND, BP_STRUCTURED_SIZE};
use crate::error::DecodeError;

/// Which pressure payload shape the deployed firmware emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureFormat {
    /// Leading content-type byte; only `0x03` carries a measurement.
    #[default]
    ContentTagged,
    /// Preamble, command, three measurement fields, progress, checksum.
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ContentType {
    CalibrateParameter = 0x01,
    CalibrateTemperature = 0x02,
    PressureData = 0x03,
}

/// Systolic, diastolic and heart rate as sent by the cuff.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PressureDataRaw {
    pub systolic: U16,
    pub diastolic: U16,
    pub heart_rate: U16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StructuredPressureRaw {
    pub preamble: [u8; 2],
    pub command: u8,
    pub data: PressureDataRaw,
    pub progress: u8,
    pub checksum: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PressureResult {
    pub systolic: u16,
    pub diastolic: u16,
    pub heart_rate: u16,
    /// Measurement progress in percent, structured firmware only.
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PressureReading {
    Result(PressureResult),
    /// Calibration block: decoded fine, nothing to show the user.
    Calibration { content: ContentType },
}

impl PressureReading {
    pub fn result(&self) -> Option<&PressureResult> {
        match self {
            PressureReading::Result(result) => Some(result),
            PressureReading::Calibration { .. } => None,
        }
    }
}

impl PressureResult {
    fn from_raw(raw: &PressureDataRaw, progress: Option<u8>) -> Self {
        Self {
            systolic: raw.systolic.get(),
            diastolic: raw.diastolic.get(),
            heart_rate: raw.heart_rate.get(),
            progress,
        }
    }
}

pub fn decode(payload: &[u8], format: PressureFormat) -> Result<PressureReading, DecodeError> {
    match format {
        PressureFormat::ContentTagged => decode_tagged(payload),
        PressureFormat::Structured => decode_structured(payload),
    }
}

fn decode_tagged(payload: &[u8]) -> Result<PressureReading, DecodeError> {
    let Some((&tag, body)) = payload.split_first() else {
        return Err(DecodeError::InsufficientData { expected: 1, actual: 0 });
    };
    let content = ContentType::try_from(tag).map_err(|_| DecodeError::UnknownContentType(tag))?;

    match content {
        ContentType::PressureData => {
            let (raw, _) = PressureDataRaw::read_from_prefix(body).map_err(|_| DecodeError::InsufficientData {
                expected: 1 + size_of::<PressureDataRaw>(),
                actual: payload.len(),
            })?;
            Ok(PressureReading::Result(PressureResult::from_raw(&raw, None)))
        }
        ContentType::CalibrateParameter | ContentType::CalibrateTemperature => {
            Ok(PressureReading::Calibration { content })
        }
    }
}

fn decode_structured(payload: &[u8]) -> Result<PressureReading, DecodeError> {
    validate_structured(payload, BP_STRUCTURED_SIZE, BP_STRUCTURED_COMMAND)?;
    let (raw, _) = StructuredPressureRaw::read_from_prefix(payload).map_err(|_| DecodeError::InsufficientData {
        expected: BP_STRUCTURED_SIZE,
        actual: payload.len(),
    })?;

    if raw.progress > 100 {
        return Err(DecodeError::OutOfRange("progress"));
    }
    Ok(PressureReading::Result(PressureResult::from_raw(&raw.data, Some(raw.progress))))
}

impl fmt::Display for PressureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} mmHg, {} bpm",
            self.systolic, self.diastolic, self.heart_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sum_checksum;

    #[test]
    fn tagged_pressure_data() {
        let payload = [0x03, 0x78, 0x00, 0x50, 0x00, 0x48, 0x00];
        let reading = decode(&payload, PressureFormat::ContentTagged).unwrap();
        assert_eq!(
            reading.result(),
            Some(&PressureResult {
                systolic: 120,
                diastolic: 80,
                heart_rate: 72,
                progress: None
            })
        );
    }

    #[test]
    fn tagged_calibration_has_no_result() {
        for tag in [0x01, 0x02] {
            let reading = decode(&[tag, 0x10, 0x20], PressureFormat::ContentTagged).unwrap();
            assert!(reading.result().is_none());
        }
    }

    #[test]
    fn tagged_fails_closed() {
        assert!(matches!(
            decode(&[0x03, 0x78, 0x00], PressureFormat::ContentTagged),
            Err(DecodeError::InsufficientData { .. })
        ));
        assert_eq!(
            decode(&[0x09, 0x00], PressureFormat::ContentTagged),
            Err(DecodeError::UnknownContentType(0x09))
        );
        assert!(decode(&[], PressureFormat::ContentTagged).is_err());
    }

    #[test]
    fn structured_with_progress() {
        let mut payload = vec![0xAA, 0x55, BP_STRUCTURED_COMMAND, 0x76, 0x00, 0x4E, 0x00, 0x41, 0x00, 100];
        payload.push(sum_checksum(&payload));
        let reading = decode(&payload, PressureFormat::Structured).unwrap();
        assert_eq!(
            reading,
            PressureReading::Result(PressureResult {
                systolic: 118,
                diastolic: 78,
                heart_rate: 65,
                progress: Some(100)
            })
        );
    }

    #[test]
    fn structured_bad_checksum() {
        let mut payload = vec![0xAA, 0x55, BP_STRUCTURED_COMMAND, 0x76, 0x00, 0x4E, 0x00, 0x41, 0x00, 100];
        payload.push(sum_checksum(&payload) ^ 0xFF);
        assert!(matches!(
            decode(&payload, PressureFormat::Structured),
            Err(DecodeError::Checksum { .. })
        ));
    }
}

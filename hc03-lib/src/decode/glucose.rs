use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::DecodeError;

/// Byte order of the 16-bit glucose value. Differs between firmware batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Test strip state reported alongside the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum StripStatus {
    Ready = 0,
    InsertStrip = 1,
    ApplySample = 2,
    Measuring = 3,
    Complete = 4,
    Error = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlucoseReading {
    pub mg_dl: f64,
    pub status: Option<StripStatus>,
}

pub fn decode(payload: &[u8], order: GlucoseByteOrder) -> Result<GlucoseReading, DecodeError> {
    let [a, b, rest @ ..] = payload else {
        return Err(DecodeError::InsufficientData {
            expected: 2,
            actual: payload.len(),
        });
    };

    let raw = match order {
        GlucoseByteOrder::BigEndian => u16::from_be_bytes([*a, *b]),
        GlucoseByteOrder::LittleEndian => u16::from_le_bytes([*a, *b]),
    };
    let status = match rest.first() {
        Some(&code) => Some(StripStatus::try_from(code).map_err(|_| DecodeError::UnknownStatus(code))?),
        None => None,
    };

    Ok(GlucoseReading {
        mg_dl: f64::from(raw) / 10.0,
        status,
    })
}

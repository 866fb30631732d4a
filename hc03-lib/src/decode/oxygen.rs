use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::validate_structured;
use crate::constants::{OX_STRUCTURED_COMMAND, OX_STRUCTURED_SIZE, OX_WAVE_BLOCK_SIZE, OX_WAVE_SAMPLES};
use crate::error::DecodeError;

/// Which oxygen payload shape the deployed firmware emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OxygenFormat {
    /// Ten big-endian 24-bit photoplethysmogram samples.
    #[default]
    Waveform,
    /// Preamble, command, SpO2, heart rate, flags, checksum.
    Structured,
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OxygenFlags {
    pub finger_present: bool,
    #[skip]
    unused: B7,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StructuredOxygenRaw {
    pub preamble: [u8; 2],
    pub command: u8,
    pub spo2: u8,
    pub heart_rate: U16,
    pub flags: u8,
    pub checksum: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum OxygenReading {
    Wave {
        samples: [u32; OX_WAVE_SAMPLES],
    },
    Spot {
        spo2: u8,
        heart_rate: u16,
        finger_present: bool,
    },
}

pub fn decode(payload: &[u8], format: OxygenFormat) -> Result<OxygenReading, DecodeError> {
    match format {
        OxygenFormat::Waveform => decode_wave(payload),
        OxygenFormat::Structured => decode_structured(payload),
    }
}

fn decode_wave(payload: &[u8]) -> Result<OxygenReading, DecodeError> {
    if payload.len() < OX_WAVE_BLOCK_SIZE {
        return Err(DecodeError::InsufficientData {
            expected: OX_WAVE_BLOCK_SIZE,
            actual: payload.len(),
        });
    }

    let mut samples = [0u32; OX_WAVE_SAMPLES];
    for (sample, chunk) in samples.iter_mut().zip(payload[..OX_WAVE_BLOCK_SIZE].chunks_exact(3)) {
        *sample = u32::from_be_bytes([0, chunk[0], chunk[1], chunk[2]]);
    }
    Ok(OxygenReading::Wave { samples })
}

fn decode_structured(payload: &[u8]) -> Result<OxygenReading, DecodeError> {
    validate_structured(payload, OX_STRUCTURED_SIZE, OX_STRUCTURED_COMMAND)?;
    let (raw, _) = StructuredOxygenRaw::read_from_prefix(payload).map_err(|_| DecodeError::InsufficientData {
        expected: OX_STRUCTURED_SIZE,
        actual: payload.len(),
    })?;

    if raw.spo2 > 100 {
        return Err(DecodeError::OutOfRange("spo2"));
    }
    let flags = OxygenFlags::from_bytes([raw.flags]);
    Ok(OxygenReading::Spot {
        spo2: raw.spo2,
        heart_rate: raw.heart_rate.get(),
        finger_present: flags.finger_present(),
    })
}

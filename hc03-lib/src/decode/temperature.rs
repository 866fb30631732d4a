use serde::Serialize;
use std::fmt;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::DecodeError;

/// Two thermopile channels, 0.02 K per LSB. Later firmware appends four more
/// bytes, which are ignored.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TemperatureRaw {
    /// Body channel
    pub bd: U16,
    /// Environment channel
    pub ev: U16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureReading {
    pub celsius: f64,
}

fn kelvin_lsb_to_celsius(raw: u16) -> f64 {
    f64::from(raw) * 0.02 - 273.15
}

/// One decimal place, halves rounded towards positive infinity.
fn round_tenth(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

impl From<TemperatureRaw> for TemperatureReading {
    fn from(raw: TemperatureRaw) -> Self {
        let body = kelvin_lsb_to_celsius(raw.bd.get());
        let environment = kelvin_lsb_to_celsius(raw.ev.get());
        let celsius = body + environment / 100.0;
        Self {
            celsius: round_tenth(celsius),
        }
    }
}

pub fn decode(payload: &[u8]) -> Result<TemperatureReading, DecodeError> {
    let (raw, _) = TemperatureRaw::read_from_prefix(payload).map_err(|_| DecodeError::InsufficientData {
        expected: size_of::<TemperatureRaw>(),
        actual: payload.len(),
    })?;
    Ok(TemperatureReading::from(raw))
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} °C", self.celsius)
    }
}

use num_enum::TryFromPrimitive;
use serde::Serialize;
use std::fmt;

use crate::error::DecodeError;

/// Status byte at the front of a battery payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum BatteryStatus {
    Query = 0x00,
    Charging = 0x01,
    Fully = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryReading {
    /// Percent, absent while charging.
    pub level: Option<u8>,
    pub charging: bool,
}

/// Millivolt thresholds (descending) and the percentage reported at or above each.
const LEVEL_TABLE: [(u32, u8); 25] = [
    (4090, 100),
    (4070, 99),
    (4056, 97),
    (4040, 95),
    (4028, 93),
    (4000, 91),
    (3980, 86),
    (3972, 83),
    (3944, 78),
    (3916, 73),
    (3888, 69),
    (3860, 65),
    (3832, 61),
    (3804, 56),
    (3776, 50),
    (3748, 42),
    (3720, 30),
    (3692, 19),
    (3664, 15),
    (3636, 11),
    (3608, 8),
    (3580, 7),
    (3524, 6),
    (3468, 5),
    (3300, 4),
];

/// Full-scale value of the battery ADC.
const ADC_FULL_SCALE: f64 = 8191.0;

/// Converts a raw 13-bit ADC reading to millivolts (3.3 V reference, 1:3 divider).
pub fn adc_to_millivolts(raw: u16) -> u32 {
    ((f64::from(raw) / ADC_FULL_SCALE) * 3.3 * 3.0 * 1000.0) as u32
}

/// Maps a raw ADC reading onto the discharge curve.
pub fn level_from_adc(raw: u16) -> u8 {
    let mv = adc_to_millivolts(raw);
    LEVEL_TABLE
        .iter()
        .find(|(threshold, _)| mv >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(0)
}

pub fn decode(payload: &[u8]) -> Result<BatteryReading, DecodeError> {
    if payload.len() < 3 {
        return Err(DecodeError::InsufficientData {
            expected: 3,
            actual: payload.len(),
        });
    }

    let status = BatteryStatus::try_from(payload[0]).map_err(|_| DecodeError::UnknownStatus(payload[0]))?;
    let reading = match status {
        BatteryStatus::Query => {
            let raw = u16::from_be_bytes([payload[1], payload[2]]);
            BatteryReading {
                level: Some(level_from_adc(raw)),
                charging: false,
            }
        }
        BatteryStatus::Charging => BatteryReading {
            level: None,
            charging: true,
        },
        BatteryStatus::Fully => BatteryReading {
            level: Some(100),
            charging: false,
        },
    };
    Ok(reading)
}

impl fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.level, self.charging) {
            (Some(level), true) => write!(f, "{}% (charging)", level),
            (Some(level), false) => write!(f, "{}%", level),
            (None, _) => write!(f, "charging"),
        }
    }
}

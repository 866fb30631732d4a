//! Per-sensor payload decoders.
//!
//! Every decoder is stateless and fails closed: a short or corrupt payload
//! yields a [`DecodeError`] and no reading. ECG payloads are never decoded
//! here; they go to the external [`crate::ecg::EcgAnalyzer`].

pub mod battery;
pub mod glucose;
pub mod oxygen;
pub mod pressure;
pub mod temperature;

use serde::{Deserialize, Serialize};

use crate::checksum::sum_checksum;
use crate::constants::STRUCTURED_PREAMBLE;
use crate::error::DecodeError;
use crate::sensor::SensorKind;

pub use battery::BatteryReading;
pub use glucose::{GlucoseByteOrder, GlucoseReading, StripStatus};
pub use oxygen::{OxygenFormat, OxygenReading};
pub use pressure::{PressureFormat, PressureReading, PressureResult};
pub use temperature::TemperatureReading;

/// Payload shapes of the deployed firmware. Chosen by configuration, never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareProfile {
    pub oxygen: OxygenFormat,
    pub pressure: PressureFormat,
    pub glucose_byte_order: GlucoseByteOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorReading {
    Battery(BatteryReading),
    Temperature(TemperatureReading),
    Glucose(GlucoseReading),
    Oxygen(OxygenReading),
    Pressure(PressureReading),
}

/// Runs the decoder for `kind`. ECG has no decoder and is reported as `None`.
pub fn decode(
    kind: SensorKind,
    payload: &[u8],
    profile: &FirmwareProfile,
) -> Option<Result<SensorReading, DecodeError>> {
    let reading = match kind {
        SensorKind::Ecg => return None,
        SensorKind::Battery => battery::decode(payload).map(SensorReading::Battery),
        SensorKind::Temperature => temperature::decode(payload).map(SensorReading::Temperature),
        SensorKind::BloodGlucose => glucose::decode(payload, profile.glucose_byte_order).map(SensorReading::Glucose),
        SensorKind::BloodOxygen => oxygen::decode(payload, profile.oxygen).map(SensorReading::Oxygen),
        SensorKind::BloodPressure => pressure::decode(payload, profile.pressure).map(SensorReading::Pressure),
    };
    Some(reading)
}

/// Length, preamble, command and trailing sum check shared by the structured forms.
pub(crate) fn validate_structured(payload: &[u8], size: usize, command: u8) -> Result<(), DecodeError> {
    if payload.len() < size {
        return Err(DecodeError::InsufficientData {
            expected: size,
            actual: payload.len(),
        });
    }
    let preamble = [payload[0], payload[1]];
    if preamble != STRUCTURED_PREAMBLE {
        return Err(DecodeError::BadPreamble(preamble));
    }
    if payload[2] != command {
        return Err(DecodeError::UnexpectedCommand {
            expected: command,
            actual: payload[2],
        });
    }
    let expected = sum_checksum(&payload[..size - 1]);
    let actual = payload[size - 1];
    if expected != actual {
        return Err(DecodeError::Checksum { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecg_is_not_decoded() {
        assert!(decode(SensorKind::Ecg, &[1, 2, 3], &FirmwareProfile::default()).is_none());
    }

    #[test]
    fn dispatch_by_kind() {
        let profile = FirmwareProfile::default();
        let reading = decode(SensorKind::Battery, &[0x02, 0x00, 0x00], &profile).unwrap().unwrap();
        assert!(matches!(reading, SensorReading::Battery(b) if b.level == Some(100)));

        let err = decode(SensorKind::BloodOxygen, &[0x00; 4], &profile).unwrap();
        assert!(err.is_err());
    }

    #[test]
    fn profile_from_json() {
        let profile: FirmwareProfile =
            serde_json::from_str(r#"{"oxygen":"structured","glucose_byte_order":"little_endian"}"#).unwrap();
        assert_eq!(profile.oxygen, OxygenFormat::Structured);
        assert_eq!(profile.pressure, PressureFormat::ContentTagged);
        assert_eq!(profile.glucose_byte_order, GlucoseByteOrder::LittleEndian);
    }
}

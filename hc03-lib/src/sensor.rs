use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;

use crate::constants::{BATTERY_RES_TYPE, BG_RES_TYPE, BP_RES_TYPE, BT_RES_TYPE, ECG_RES_TYPE, OX_RES_TYPE};
use crate::error::HcError;

/// Sensor kinds the HC03 reports, keyed by the frame TYPE byte.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum SensorKind {
    #[strum(to_string = "ECG")]
    #[serde(rename = "ECG")]
    Ecg = ECG_RES_TYPE,
    #[strum(to_string = "BP")]
    #[serde(rename = "BP")]
    BloodPressure = BP_RES_TYPE,
    #[strum(to_string = "BT")]
    #[serde(rename = "BT")]
    Temperature = BT_RES_TYPE,
    #[strum(to_string = "BG")]
    #[serde(rename = "BG")]
    BloodGlucose = BG_RES_TYPE,
    #[strum(to_string = "OX")]
    #[serde(rename = "OX")]
    BloodOxygen = OX_RES_TYPE,
    #[strum(to_string = "BATTERY")]
    #[serde(rename = "BATTERY")]
    Battery = BATTERY_RES_TYPE,
}

impl SensorKind {
    pub const ALL: [SensorKind; 6] = [
        SensorKind::Ecg,
        SensorKind::BloodPressure,
        SensorKind::Temperature,
        SensorKind::BloodGlucose,
        SensorKind::BloodOxygen,
        SensorKind::Battery,
    ];

    /// Look up the kind for a frame TYPE byte.
    pub fn from_type_code(code: u8) -> Option<Self> {
        Self::try_from(code).ok()
    }

    pub fn type_code(self) -> u8 {
        self.into()
    }
}

impl FromStr for SensorKind {
    type Err = HcError;

    /// Accepts the detection tokens the host uses (`ECG`, `OX`, `BP`, `BG`, `BATTERY`, `BT`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ECG" => Ok(SensorKind::Ecg),
            "OX" => Ok(SensorKind::BloodOxygen),
            "BP" => Ok(SensorKind::BloodPressure),
            "BG" => Ok(SensorKind::BloodGlucose),
            "BATTERY" => Ok(SensorKind::Battery),
            "BT" => Ok(SensorKind::Temperature),
            _ => Err(HcError::UnknownDetection(s.to_string())),
        }
    }
}

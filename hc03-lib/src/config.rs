//! Per-deployment session settings.
//!
//! Everything has a default matching the stock HC03 firmware, so an empty
//! JSON object is a valid configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_SCAN_TIMEOUT, DEVICE_NAME_PREFIXES, NOTIFY_CHARACTERISTIC_UUID, SERVICE_UUID, WRITE_CHARACTERISTIC_UUID,
};
use crate::decode::FirmwareProfile;
use crate::ecg::EcgProfile;
use crate::error::HcError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Scanning stops on its own after this many seconds.
    pub scan_timeout_secs: u64,
    pub service_uuid: Uuid,
    pub write_characteristic_uuid: Uuid,
    pub notify_characteristic_uuid: Uuid,
    /// Advertised names that identify a supported device. Empty accepts everything.
    pub name_prefixes: Vec<String>,
    pub firmware: FirmwareProfile,
    pub ecg_profile: EcgProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
            service_uuid: SERVICE_UUID,
            write_characteristic_uuid: WRITE_CHARACTERISTIC_UUID,
            notify_characteristic_uuid: NOTIFY_CHARACTERISTIC_UUID,
            name_prefixes: DEVICE_NAME_PREFIXES.iter().map(|p| p.to_string()).collect(),
            firmware: FirmwareProfile::default(),
            ecg_profile: EcgProfile::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, HcError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HcError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn accepts_device_name(&self, name: &str) -> bool {
        self.name_prefixes.is_empty() || self.name_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

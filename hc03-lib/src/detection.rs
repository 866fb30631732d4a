use std::collections::BTreeSet;

use crate::sensor::SensorKind;

/// Sensor kinds the host has opted into. Payloads of other kinds are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetectionSet {
    armed: BTreeSet<SensorKind>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `kind` was not armed before.
    pub fn arm(&mut self, kind: SensorKind) -> bool {
        self.armed.insert(kind)
    }

    /// Returns `true` if `kind` was armed before.
    pub fn disarm(&mut self, kind: SensorKind) -> bool {
        self.armed.remove(&kind)
    }

    pub fn is_armed(&self, kind: SensorKind) -> bool {
        self.armed.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

//! Named events published to the host.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::IntoStaticStr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::decode::{BatteryReading, GlucoseReading, OxygenReading, PressureResult, SensorReading, TemperatureReading};
use crate::ecg::{EcgMetricKind, EcgSignal};
use crate::error::TransportError;
use crate::sensor::SensorKind;
use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn now(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn name(&self) -> &'static str {
        self.payload.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventPayload {
    BatteryLevel(BatteryReading),
    TemperatureReading(TemperatureReading),
    GlucoseResult(GlucoseReading),
    OxygenData(OxygenReading),
    PressureResult(PressureResult),
    EcgWave { value: i32 },
    EcgSignalQuality { quality: u8 },
    EcgMetric { kind: EcgMetricKind, value: i32 },
    EcgFingerContact { touching: bool },
    ConnectionState { state: ConnectionState },
    DeviceFound { address: String, name: String, rssi: Option<i16> },
    ScanError { message: String },
    TransportError { message: String, code: Option<i32> },
    DetectionStarted { kind: SensorKind },
    DetectionStopped { kind: SensorKind },
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// `None` for readings with nothing to show, such as pressure calibration blocks.
    pub fn from_reading(reading: SensorReading) -> Option<Self> {
        let payload = match reading {
            SensorReading::Battery(r) => EventPayload::BatteryLevel(r),
            SensorReading::Temperature(r) => EventPayload::TemperatureReading(r),
            SensorReading::Glucose(r) => EventPayload::GlucoseResult(r),
            SensorReading::Oxygen(r) => EventPayload::OxygenData(r),
            SensorReading::Pressure(r) => EventPayload::PressureResult(*r.result()?),
        };
        Some(payload)
    }

    pub fn from_ecg(signal: EcgSignal) -> Self {
        match signal {
            EcgSignal::Wave(value) => EventPayload::EcgWave { value },
            EcgSignal::SignalQuality(quality) => EventPayload::EcgSignalQuality { quality },
            EcgSignal::Metric { kind, value } => EventPayload::EcgMetric { kind, value },
            EcgSignal::FingerContact(touching) => EventPayload::EcgFingerContact { touching },
        }
    }

    pub fn from_transport_error(error: &TransportError) -> Self {
        EventPayload::TransportError {
            message: error.to_string(),
            code: error.code(),
        }
    }
}

/// Where a session publishes its events.
pub trait EventSink: Send {
    fn emit(&mut self, event: Event);
}

impl EventSink for mpsc::UnboundedSender<Event> {
    fn emit(&mut self, event: Event) {
        if let Err(e) = self.send(event) {
            debug!("Event receiver dropped, discarding {}", e.0.name());
        }
    }
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

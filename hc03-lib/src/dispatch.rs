use serde::Serialize;
use tracing::debug;

use crate::decode::{self, FirmwareProfile};
use crate::detection::DetectionSet;
use crate::ecg::{EcgAnalyzer, EcgProfile, NullEcgAnalyzer};
use crate::event::EventPayload;
use crate::frame::OriginData;
use crate::sensor::SensorKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub decoder_invocations: u64,
    pub decode_failures: u64,
    /// Payloads of a kind nobody armed.
    pub dropped_unarmed: u64,
    pub unknown_type: u64,
    pub ecg_forwarded: u64,
}

/// Routes accepted frames to the decoder for their kind, or to the ECG analyzer.
pub struct Dispatcher {
    firmware: FirmwareProfile,
    analyzer: Box<dyn EcgAnalyzer>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(firmware: FirmwareProfile) -> Self {
        Self::with_analyzer(firmware, Box::new(NullEcgAnalyzer))
    }

    pub fn with_analyzer(firmware: FirmwareProfile, analyzer: Box<dyn EcgAnalyzer>) -> Self {
        Self {
            firmware,
            analyzer,
            stats: DispatchStats::default(),
        }
    }

    pub fn set_analyzer(&mut self, analyzer: Box<dyn EcgAnalyzer>) {
        self.analyzer = analyzer;
    }

    pub fn configure_ecg(&mut self, profile: &EcgProfile) {
        self.analyzer.configure(profile);
    }

    pub fn reset_ecg(&mut self) {
        self.analyzer.reset();
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Events produced by one accepted frame. Empty when the kind is not
    /// armed, the payload does not decode, or the reading has nothing to show.
    pub fn dispatch(&mut self, origin: &OriginData, detections: &DetectionSet) -> Vec<EventPayload> {
        let Some(kind) = origin.kind() else {
            self.stats.unknown_type += 1;
            debug!(sensor_type = format_args!("{:#04x}", origin.sensor_type), "Unknown sensor type");
            return Vec::new();
        };

        if !detections.is_armed(kind) {
            self.stats.dropped_unarmed += 1;
            debug!(%kind, "Dropping payload, detection not armed");
            return Vec::new();
        }

        if kind == SensorKind::Ecg {
            return self.forward_ecg(&origin.payload);
        }

        self.stats.decoder_invocations += 1;
        match decode::decode(kind, &origin.payload, &self.firmware) {
            Some(Ok(reading)) => EventPayload::from_reading(reading).into_iter().collect(),
            Some(Err(e)) => {
                self.stats.decode_failures += 1;
                debug!(%kind, "Decode failed: {}", e);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Hands raw ECG bytes that arrived outside a frame to the analyzer.
    pub fn submit_ecg(&mut self, payload: &[u8], detections: &DetectionSet) -> Vec<EventPayload> {
        if !detections.is_armed(SensorKind::Ecg) {
            self.stats.dropped_unarmed += 1;
            debug!("Dropping ECG samples, detection not armed");
            return Vec::new();
        }
        self.forward_ecg(payload)
    }

    fn forward_ecg(&mut self, payload: &[u8]) -> Vec<EventPayload> {
        self.stats.ecg_forwarded += 1;
        self.analyzer
            .submit(payload)
            .into_iter()
            .map(EventPayload::from_ecg)
            .collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("firmware", &self.firmware)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

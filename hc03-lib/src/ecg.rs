//! Boundary to the external ECG analysis library.
//!
//! The session never interprets ECG bytes. It forwards each accepted ECG
//! payload to an [`EcgAnalyzer`] and republishes whatever signals come back.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Metrics the analysis library reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum EcgMetricKind {
    #[strum(to_string = "HR")]
    HeartRate,
    #[strum(to_string = "ROBUST HR")]
    RobustHeartRate,
    #[strum(to_string = "HRV")]
    Hrv,
    #[strum(to_string = "Mood Index")]
    MoodIndex,
    #[strum(to_string = "RR")]
    RrInterval,
    #[strum(to_string = "RESPIRATORY RATE")]
    RespiratoryRate,
    #[strum(to_string = "STRESS")]
    Stress,
    #[strum(to_string = "HEART AGE")]
    HeartAge,
    #[strum(to_string = "HEART BEAT")]
    HeartBeat,
}

/// One callback from the analysis library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcgSignal {
    Wave(i32),
    SignalQuality(u8),
    Metric { kind: EcgMetricKind, value: i32 },
    FingerContact(bool),
}

/// User profile the analysis library is seeded with before a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgProfile {
    pub username: String,
    pub female: bool,
    pub age: u8,
    pub height_cm: u16,
    pub weight_kg: u16,
}

impl Default for EcgProfile {
    fn default() -> Self {
        Self {
            username: String::new(),
            female: true,
            age: 0,
            height_cm: 0,
            weight_kg: 0,
        }
    }
}

/// Mood bands for the mood index metric (1..=100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum MoodState {
    Chill,
    Relax,
    Balance,
    Excitation,
    Anxiety,
}

impl MoodState {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            1..=20 => Some(MoodState::Chill),
            21..=40 => Some(MoodState::Relax),
            41..=60 => Some(MoodState::Balance),
            61..=80 => Some(MoodState::Excitation),
            81..=100 => Some(MoodState::Anxiety),
            _ => None,
        }
    }
}

pub trait EcgAnalyzer: Send {
    /// Called by `initialize()` and whenever the profile changes.
    fn configure(&mut self, profile: &EcgProfile);

    /// Feeds one raw ECG payload, unmodified. Returns the signals it produced.
    fn submit(&mut self, payload: &[u8]) -> Vec<EcgSignal>;

    /// Called when ECG detection is disarmed or the link goes away.
    fn reset(&mut self);
}

/// Stand-in used when the host has no analysis library; swallows everything.
#[derive(Debug, Default)]
pub struct NullEcgAnalyzer;

impl EcgAnalyzer for NullEcgAnalyzer {
    fn configure(&mut self, _profile: &EcgProfile) {}

    fn submit(&mut self, _payload: &[u8]) -> Vec<EcgSignal> {
        Vec::new()
    }

    fn reset(&mut self) {}
}

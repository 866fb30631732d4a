use std::io;
use thiserror::Error;

use crate::state::ConnectionState;

/// Why the unpacker refused a buffer.
///
/// None of these cross the session boundary as user-facing failures; the
/// session logs them and bumps a counter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Frame truncated: header announces {expected} bytes, buffer holds {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Header checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    HeaderChecksum { expected: u8, actual: u8 },

    #[error("Tail checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    TailChecksum { expected: u16, actual: u16 },

    #[error("Tail fragment without a pending head fragment")]
    MissingHead,
}

impl FrameError {
    /// Coarse class used for diagnostics.
    pub fn class(&self) -> &'static str {
        match self {
            FrameError::TooShort { .. } | FrameError::Truncated { .. } => "format",
            FrameError::HeaderChecksum { .. } | FrameError::TailChecksum { .. } => "checksum",
            FrameError::MissingHead => "reassembly",
        }
    }
}

/// A sensor payload that could not be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Bad preamble: {0:02x?}")]
    BadPreamble([u8; 2]),

    #[error("Unexpected command byte {actual:#04x}, expected {expected:#04x}")]
    UnexpectedCommand { expected: u8, actual: u8 },

    #[error("Unknown status code {0:#04x}")]
    UnknownStatus(u8),

    #[error("Unknown content type {0:#04x}")]
    UnknownContentType(u8),

    #[error("Value out of range: {0}")]
    OutOfRange(&'static str),
}

/// Failures reported by, or while driving, the BLE transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Bluetooth adapter unavailable")]
    AdapterUnavailable,

    #[error("Missing capability: {0}")]
    MissingCapability(String),

    #[error("Connect failed with code {0}")]
    ConnectFailed(i32),

    #[error("Service discovery failed with code {0}")]
    DiscoveryFailed(i32),

    #[error("Service {0} not found")]
    ServiceNotFound(uuid::Uuid),

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("Descriptor write failed with code {0}")]
    DescriptorWrite(i32),

    #[error("Link lost")]
    LinkLost,

    #[error("Transport backend error: {0}")]
    Backend(String),
}

impl TransportError {
    /// Numeric code carried to the host in error events, when there is one.
    pub fn code(&self) -> Option<i32> {
        match self {
            TransportError::ConnectFailed(code)
            | TransportError::DiscoveryFailed(code)
            | TransportError::DescriptorWrite(code) => Some(*code),
            _ => None,
        }
    }
}

/// The primary error type for the `hc03-lib` library.
#[derive(Error, Debug)]
pub enum HcError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Session not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Operation not allowed in state {0}")]
    InvalidState(ConnectionState),

    #[error("Unknown detection kind: {0}")]
    UnknownDetection(String),
}

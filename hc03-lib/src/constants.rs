// Protocol constants for HC03

use std::time::Duration;
use uuid::Uuid;

/// Offset of the start marker
pub const INDEX_START: usize = 0;

/// Offset of the 16-bit little-endian content length
pub const INDEX_LENGTH: usize = 1;

/// Offset of the protocol version byte
pub const INDEX_BT_EDITION: usize = 3;

/// Offset of the sensor type byte
pub const INDEX_TYPE: usize = 4;

/// Offset of the header checksum byte
pub const INDEX_HEADER_CRC: usize = 5;

/// Offset where content starts
pub const INDEX_CONTENT: usize = 6;

/// Size of the frame header (6 bytes)
pub const HEADER_SIZE: usize = INDEX_CONTENT;

/// Size of the trailing frame checksum (2 bytes)
pub const TAIL_CRC_SIZE: usize = 2;

/// Size of the end marker (1 byte)
pub const END_SIZE: usize = 1;

/// Bytes that follow the content: tail checksum plus end marker
pub const TRAILER_SIZE: usize = TAIL_CRC_SIZE + END_SIZE;

/// Minimum size for a buffer to be considered at all (header + trailer)
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest content length carried by a self-contained frame
pub const FULL_PACKAGE_MAX_DATA_SIZE: usize = 11;

/// Start marker on host requests
pub const ATTR_START_REQ: u8 = 0x01;

/// Start marker on device responses
pub const ATTR_START_RES: u8 = 0x02;

/// Fixed protocol version byte
pub const BT_EDITION: u8 = 0x04;

/// End marker
pub const ATTR_END: u8 = 0xFF;

/// Sensor type: ECG sample stream
pub const ECG_RES_TYPE: u8 = 0x80;

/// Sensor type: blood pressure
pub const BP_RES_TYPE: u8 = 0x81;

/// Sensor type: body temperature
pub const BT_RES_TYPE: u8 = 0x82;

/// Sensor type: blood glucose
pub const BG_RES_TYPE: u8 = 0x83;

/// Sensor type: blood oxygen
pub const OX_RES_TYPE: u8 = 0x84;

/// Sensor type: battery
pub const BATTERY_RES_TYPE: u8 = 0x8F;

/// Preamble of the structured oxygen/pressure payloads
pub const STRUCTURED_PREAMBLE: [u8; 2] = [0xAA, 0x55];

/// Command byte of a structured oxygen payload
pub const OX_STRUCTURED_COMMAND: u8 = 0x14;

/// Command byte of a structured pressure payload
pub const BP_STRUCTURED_COMMAND: u8 = 0x15;

/// Size of the oxygen waveform block (ten 24-bit samples)
pub const OX_WAVE_BLOCK_SIZE: usize = 30;

/// Number of samples in an oxygen waveform block
pub const OX_WAVE_SAMPLES: usize = 10;

/// Size of a structured oxygen payload
pub const OX_STRUCTURED_SIZE: usize = 8;

/// Size of a structured pressure payload
pub const BP_STRUCTURED_SIZE: usize = 11;

/// HC03 GATT service
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb);

/// Characteristic the host writes commands to
pub const WRITE_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000fff1_0000_1000_8000_00805f9b34fb);

/// Characteristic the device notifies frames on
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000fff2_0000_1000_8000_00805f9b34fb);

/// Advertised name prefixes of HC03 units
pub const DEVICE_NAME_PREFIXES: [&str; 2] = ["HC03", "LT-"];

/// Scanning stops on its own after this long
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

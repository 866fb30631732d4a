//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hc03_lib::config::SessionConfig;
#[allow(unused_imports)]
pub use hc03_lib::error::{FrameError, HcError, TransportError};
#[allow(unused_imports)]
pub use hc03_lib::event::{Event, EventPayload};
#[allow(unused_imports)]
pub use hc03_lib::frame::{OriginData, encode_response, split_frame};
#[allow(unused_imports)]
pub use hc03_lib::sensor::SensorKind;
#[allow(unused_imports)]
pub use hc03_lib::session::{Command, Session, SessionInput};
#[allow(unused_imports)]
pub use hc03_lib::state::ConnectionState;
#[allow(unused_imports)]
pub use hc03_lib::transport::{GattService, LinkId, OfflineTransport, TransportCall, TransportEvent};
#[allow(unused_imports)]
pub use hc03_lib::unpack::{Unpacked, Unpacker};
#[allow(unused_imports)]
pub use hex;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Battery notification captured from a unit: status query, raw ADC 0x1FFF
#[allow(dead_code)]
pub const BATTERY_QUERY_FRAME: &str = "020300048f8a001fffc6efff";

#[allow(dead_code)]
pub type OfflineSession = Session<OfflineTransport, Vec<Event>>;

/// Session over the offline transport, already initialized.
#[allow(dead_code)]
pub fn offline_session(config: SessionConfig) -> OfflineSession {
    let mut session = Session::new(config, OfflineTransport::new(), Vec::new());
    session.initialize();
    session
}

/// The service table a genuine HC03 reports during discovery.
#[allow(dead_code)]
pub fn hc03_services(config: &SessionConfig) -> Vec<GattService> {
    vec![
        GattService {
            uuid: uuid_from_short(0x180a),
            characteristics: vec![uuid_from_short(0x2a29)],
        },
        GattService {
            uuid: config.service_uuid,
            characteristics: vec![config.write_characteristic_uuid, config.notify_characteristic_uuid],
        },
    ]
}

#[allow(dead_code)]
pub fn uuid_from_short(short: u16) -> uuid::Uuid {
    uuid::Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

#[allow(dead_code)]
pub fn event_names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

#[allow(dead_code)]
pub fn connection_states(events: &[Event]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e.payload {
            EventPayload::ConnectionState { state } => Some(state),
            _ => None,
        })
        .collect()
}

/// Installs a test subscriber honouring RUST_LOG. Safe to call from every test.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

pub mod checksum;
pub mod config;
pub mod constants;
pub mod decode;
pub mod detection;
pub mod dispatch;
pub mod ecg;
pub mod error;
pub mod event;
pub mod frame;
pub mod reassembly;
pub mod sensor;
pub mod session;
pub mod state;
pub mod transport;
pub mod unpack;

// Re-export the types a host needs to drive a session
pub use config::SessionConfig;
pub use error::HcError;
pub use event::{Event, EventPayload, EventSink};
pub use sensor::SensorKind;
pub use session::{Command, Session, SessionInput, SessionStats};
pub use state::ConnectionState;
pub use transport::{LinkId, OfflineTransport, Transport, TransportEvent};
pub use unpack::{Unpacked, Unpacker};

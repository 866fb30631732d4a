//! Seam between the session and a concrete BLE stack.
//!
//! Requests on [`Transport`] return as soon as they are issued. Their
//! completions come back later as [`TransportEvent`]s on the session inbox,
//! tagged with the [`LinkId`] of the connect attempt they belong to.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::error::TransportError;

/// Identifies one connect attempt. A fresh id is allocated per attempt, so
/// completions for a torn-down link can be recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

impl GattService {
    pub fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.characteristics.contains(&uuid)
    }
}

/// Completions and unsolicited notifications from the BLE stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    DeviceFound {
        address: String,
        name: Option<String>,
        rssi: Option<i16>,
    },
    ScanFailed {
        code: i32,
    },
    Connected {
        link: LinkId,
    },
    ConnectFailed {
        link: LinkId,
        code: i32,
    },
    ServicesDiscovered {
        link: LinkId,
        services: Vec<GattService>,
    },
    DiscoveryFailed {
        link: LinkId,
        code: i32,
    },
    /// Result of writing the notification-enable descriptor; status 0 is success.
    DescriptorWritten {
        link: LinkId,
        status: i32,
    },
    Notification {
        link: LinkId,
        characteristic: Uuid,
        value: Bytes,
    },
    Disconnected {
        link: LinkId,
    },
    Failure {
        link: Option<LinkId>,
        error: TransportError,
    },
}

impl TransportEvent {
    pub fn link(&self) -> Option<LinkId> {
        match self {
            TransportEvent::DeviceFound { .. } | TransportEvent::ScanFailed { .. } => None,
            TransportEvent::Connected { link }
            | TransportEvent::ConnectFailed { link, .. }
            | TransportEvent::ServicesDiscovered { link, .. }
            | TransportEvent::DiscoveryFailed { link, .. }
            | TransportEvent::DescriptorWritten { link, .. }
            | TransportEvent::Notification { link, .. }
            | TransportEvent::Disconnected { link } => Some(*link),
            TransportEvent::Failure { link, .. } => *link,
        }
    }
}

pub trait Transport: Send {
    /// Adapter present, powered and permitted to scan and connect.
    fn check_ready(&self) -> Result<(), TransportError>;

    fn start_scan(&mut self) -> Result<(), TransportError>;

    fn stop_scan(&mut self) -> Result<(), TransportError>;

    fn connect(&mut self, address: &str, link: LinkId) -> Result<(), TransportError>;

    fn discover_services(&mut self, link: LinkId) -> Result<(), TransportError>;

    fn enable_notifications(&mut self, link: LinkId, service: Uuid, characteristic: Uuid)
    -> Result<(), TransportError>;

    fn disconnect(&mut self, link: LinkId) -> Result<(), TransportError>;
}

/// A request the session issued, as recorded by [`OfflineTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    StartScan,
    StopScan,
    Connect { address: String, link: LinkId },
    DiscoverServices(LinkId),
    EnableNotifications { link: LinkId, service: Uuid, characteristic: Uuid },
    Disconnect(LinkId),
}

/// Transport with no radio behind it. Records every request and completes
/// nothing on its own; completions are injected by whoever drives the session.
///
/// Used for offline replay of captured notifications and for tests.
#[derive(Debug, Default)]
pub struct OfflineTransport {
    pub calls: Vec<TransportCall>,
    /// Reported by `check_ready` when set.
    pub unavailable: Option<TransportError>,
    /// Returned by the next `disconnect` or `stop_scan` request when set.
    pub teardown_error: Option<TransportError>,
}

impl OfflineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, call: TransportCall) {
        debug!(?call, "Offline transport request");
        self.calls.push(call);
    }
}

impl Transport for OfflineTransport {
    fn check_ready(&self) -> Result<(), TransportError> {
        match &self.unavailable {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn start_scan(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::StartScan);
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::StopScan);
        self.teardown_error.take().map_or(Ok(()), Err)
    }

    fn connect(&mut self, address: &str, link: LinkId) -> Result<(), TransportError> {
        self.record(TransportCall::Connect {
            address: address.to_string(),
            link,
        });
        Ok(())
    }

    fn discover_services(&mut self, link: LinkId) -> Result<(), TransportError> {
        self.record(TransportCall::DiscoverServices(link));
        Ok(())
    }

    fn enable_notifications(
        &mut self,
        link: LinkId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::EnableNotifications {
            link,
            service,
            characteristic,
        });
        Ok(())
    }

    fn disconnect(&mut self, link: LinkId) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect(link));
        self.teardown_error.take().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_link_tags() {
        assert_eq!(TransportEvent::ScanFailed { code: 2 }.link(), None);
        assert_eq!(TransportEvent::Connected { link: LinkId(3) }.link(), Some(LinkId(3)));
        assert_eq!(
            TransportEvent::Failure {
                link: None,
                error: TransportError::LinkLost
            }
            .link(),
            None
        );
    }

    #[test]
    fn offline_teardown_error_is_one_shot() {
        let mut transport = OfflineTransport {
            teardown_error: Some(TransportError::LinkLost),
            ..OfflineTransport::default()
        };
        assert!(transport.disconnect(LinkId(1)).is_err());
        assert!(transport.disconnect(LinkId(1)).is_ok());
        assert_eq!(transport.calls.len(), 2);
    }
}

use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};

/// Lifecycle of one device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    ServicesDiscovering,
    NotificationsEnabling,
    Ready,
    Disconnected,
    Error,
}

impl ConnectionState {
    /// A link is being set up or is up; transport callbacks are expected.
    pub fn has_link(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::ServicesDiscovering
                | ConnectionState::NotificationsEnabling
                | ConnectionState::Ready
        )
    }

    /// No link and nothing in flight; callbacks arriving now are stale.
    pub fn is_quiescent(self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Error
        )
    }
}

use bytes::Bytes;
use tracing::debug;

/// A head fragment waiting for its tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFragment {
    pub sensor_type: u8,
    pub raw_head: Bytes,
}

/// Holds at most one pending head fragment.
///
/// A new head replaces the old one; there is no queueing.
#[derive(Debug, Default)]
pub struct ReassemblyCache {
    pending: Option<PendingFragment>,
}

impl ReassemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, sensor_type: u8, raw_head: Bytes) {
        if let Some(old) = self.pending.replace(PendingFragment { sensor_type, raw_head }) {
            debug!(
                sensor_type = format_args!("{:#04x}", old.sensor_type),
                "Replacing pending head fragment"
            );
        }
    }

    /// Removes and returns the pending fragment.
    pub fn take(&mut self) -> Option<PendingFragment> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingFragment> {
        self.pending.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

//! The collaborator boundary.
//!
//! A collaborator owns device enumeration and change detection. The
//! application opens one session with a substring filter, reads the attached
//! device on demand, and receives hints through callbacks that fire on a
//! thread the collaborator controls.

use super::device::{AudioError, DeviceDescription, DeviceHint};
use std::fmt;
use std::sync::Arc;

/// Receives attach/detach/volume hints. Called from collaborator threads.
pub type EventSink = Arc<dyn Fn(DeviceHint) + Send + Sync>;

/// Receives diagnostic lines. The flag marks error lines.
pub type LogSink = Arc<dyn Fn(bool, &str) + Send + Sync>;

/// Opaque token for one initialize/uninitialize session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Session-based access to the attached audio device.
///
/// Implementations keep `on_event` and `on_log` alive until the session is
/// uninitialized and may invoke them from any thread at any time before that.
pub trait Collaborator: Send + Sync {
    /// Open a session limited to devices whose name or identifier contains
    /// `filter`. An empty filter matches every device.
    fn initialize(
        &self,
        filter: &str,
        on_event: EventSink,
        on_log: LogSink,
    ) -> Result<SessionHandle, AudioError>;

    /// Describe the attached device, or return an empty description.
    fn query_attached(&self, handle: SessionHandle) -> Result<DeviceDescription, AudioError>;

    /// Close the session. Callbacks are not invoked after this returns.
    fn uninitialize(&self, handle: SessionHandle) -> Result<(), AudioError>;
}

/// Case-insensitive substring match against a device's name or identifier.
pub fn matches_filter(filter: &str, id: &str, name: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    let filter = filter.to_lowercase();
    name.to_lowercase().contains(&filter) || id.to_lowercase().contains(&filter)
}

/// The hint implied by moving from one attached-device snapshot to the next.
pub fn hint_between(
    previous: Option<&DeviceDescription>,
    next: Option<&DeviceDescription>,
) -> Option<DeviceHint> {
    match (previous, next) {
        (None, None) => None,
        (None, Some(_)) => Some(DeviceHint::Attached),
        (Some(_), None) => Some(DeviceHint::Detached),
        (Some(old), Some(new)) if old.id != new.id => Some(DeviceHint::Attached),
        (Some(old), Some(new)) if old.volume != new.volume => Some(DeviceHint::VolumeChanged),
        (Some(_), Some(_)) => None,
    }
}

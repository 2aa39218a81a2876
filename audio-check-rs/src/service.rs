//! Device service: owns one collaborator session.

use crate::audio::{AudioError, Collaborator, DeviceInfo, EventSink, LogSink, SessionHandle};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One open collaborator session.
///
/// Dropping the service closes the session.
pub struct DeviceService {
    collaborator: Arc<dyn Collaborator>,
    handle: SessionHandle,
    filter: String,
    // The collaborator may invoke these until the session is closed
    _on_event: EventSink,
    _on_log: LogSink,
}

impl DeviceService {
    /// Open a session for devices whose name or identifier contains `filter`.
    pub fn initialize(
        collaborator: Arc<dyn Collaborator>,
        filter: &str,
        on_event: EventSink,
        on_log: LogSink,
    ) -> Result<Self, AudioError> {
        let handle =
            collaborator.initialize(filter, Arc::clone(&on_event), Arc::clone(&on_log))?;
        info!(%handle, filter, "Audio collaborator session opened");

        Ok(Self {
            collaborator,
            handle,
            filter: filter.to_string(),
            _on_event: on_event,
            _on_log: on_log,
        })
    }

    /// The attached device matching the filter, or an empty projection.
    pub fn current_device(&self) -> Result<DeviceInfo, AudioError> {
        let description = self.collaborator.query_attached(self.handle)?;
        Ok(description.into())
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}

impl Drop for DeviceService {
    fn drop(&mut self) {
        match self.collaborator.uninitialize(self.handle) {
            Ok(()) => info!(handle = %self.handle, "Audio collaborator session closed"),
            Err(e) => warn!(handle = %self.handle, "Failed to close collaborator session: {e}"),
        }
    }
}

/// Log sink that forwards collaborator lines to `tracing`.
pub fn log_sink() -> LogSink {
    Arc::new(|is_error: bool, line: &str| {
        if is_error {
            error!(target: "collaborator", "{line}");
        } else {
            info!(target: "collaborator", "{line}");
        }
    })
}

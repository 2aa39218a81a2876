//! Audio module: the collaborator boundary and its implementations.
//!
//! This module provides the boundary data model, the `Collaborator` trait,
//! a binding to native collaborator libraries, and a built-in collaborator
//! on the Windows Core Audio API.

pub mod collaborator;
pub mod device;
pub mod endpoints;
pub mod monitor;
pub mod native;

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod notifications;
#[cfg(windows)]
pub mod volume;
#[cfg(windows)]
pub mod wasapi;

#[cfg(test)]
pub mod fake;

pub use collaborator::{Collaborator, EventSink, LogSink, SessionHandle};
pub use device::{AcDescription, AcStatus, AudioError, DeviceDescription, DeviceHint, DeviceInfo};
pub use monitor::MonitoredCollaborator;
pub use native::NativeCollaborator;

use crate::config::{Backend, Settings};
use std::sync::Arc;
use std::time::Duration;

/// The built-in collaborator for this platform.
#[cfg(windows)]
pub fn builtin_collaborator(
    poll_interval: Duration,
    include_capture: bool,
) -> Result<Arc<dyn Collaborator>, AudioError> {
    let factory = wasapi::WasapiProbeFactory::new(include_capture);
    Ok(Arc::new(MonitoredCollaborator::new(factory, poll_interval)))
}

/// The built-in collaborator for this platform.
#[cfg(not(windows))]
pub fn builtin_collaborator(
    _poll_interval: Duration,
    _include_capture: bool,
) -> Result<Arc<dyn Collaborator>, AudioError> {
    Err(AudioError::CollaboratorUnavailable(format!(
        "no built-in audio backend for {}",
        std::env::consts::OS
    )))
}

/// Open the collaborator selected by `settings`.
pub fn open_collaborator(settings: &Settings) -> Result<Arc<dyn Collaborator>, AudioError> {
    match settings.backend {
        Backend::Builtin => {
            builtin_collaborator(settings.poll_interval(), settings.include_capture)
        }
        Backend::Native => {
            let collaborator = NativeCollaborator::load(settings.library_path())?;
            Ok(Arc::new(collaborator))
        }
    }
}

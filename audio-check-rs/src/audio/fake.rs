//! Scripted in-memory collaborator for tests.

use super::collaborator::{matches_filter, Collaborator, EventSink, LogSink, SessionHandle};
use super::device::{AudioError, DeviceDescription, DeviceHint};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct FakeSession {
    filter: String,
    on_event: EventSink,
    on_log: LogSink,
}

#[derive(Default)]
struct FakeState {
    devices: Vec<DeviceDescription>,
    sessions: HashMap<u64, FakeSession>,
    next_handle: u64,
    unavailable: bool,
    fail_queries: bool,
    queries: usize,
    uninitialized: Vec<SessionHandle>,
}

/// Collaborator whose devices and hints are driven by the test.
#[derive(Default)]
pub struct FakeCollaborator {
    state: Mutex<FakeState>,
}

impl FakeCollaborator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_devices(devices: Vec<DeviceDescription>) -> Arc<Self> {
        let fake = Self::new();
        fake.state.lock().unwrap().devices = devices;
        fake
    }

    /// Make `initialize` fail as if the backend were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn set_query_failure(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    pub fn attach(&self, device: DeviceDescription) {
        self.state.lock().unwrap().devices.push(device);
    }

    pub fn detach_all(&self) {
        self.state.lock().unwrap().devices.clear();
    }

    pub fn set_volume(&self, id: &str, volume: u16) {
        let mut state = self.state.lock().unwrap();
        for device in state.devices.iter_mut().filter(|d| d.id.as_str() == id) {
            device.volume = volume;
        }
    }

    /// Push a hint to every live session, as the collaborator thread would.
    pub fn emit(&self, hint: DeviceHint) {
        let sinks: Vec<EventSink> = self
            .state
            .lock()
            .unwrap()
            .sessions
            .values()
            .map(|s| Arc::clone(&s.on_event))
            .collect();
        for sink in sinks {
            sink(hint);
        }
    }

    pub fn log(&self, is_error: bool, line: &str) {
        let sinks: Vec<LogSink> = self
            .state
            .lock()
            .unwrap()
            .sessions
            .values()
            .map(|s| Arc::clone(&s.on_log))
            .collect();
        for sink in sinks {
            sink(is_error, line);
        }
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn uninitialized(&self) -> Vec<SessionHandle> {
        self.state.lock().unwrap().uninitialized.clone()
    }
}

impl Collaborator for FakeCollaborator {
    fn initialize(
        &self,
        filter: &str,
        on_event: EventSink,
        on_log: LogSink,
    ) -> Result<SessionHandle, AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(AudioError::CollaboratorUnavailable("fake backend offline".into()));
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.sessions.insert(
            handle,
            FakeSession {
                filter: filter.to_string(),
                on_event,
                on_log,
            },
        );
        Ok(SessionHandle::from_raw(handle))
    }

    fn query_attached(&self, handle: SessionHandle) -> Result<DeviceDescription, AudioError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        if state.fail_queries {
            return Err(AudioError::Status {
                operation: "AcGetAttached",
                code: -4,
            });
        }
        let session = state
            .sessions
            .get(&handle.as_raw())
            .ok_or(AudioError::InvalidHandle(handle.as_raw()))?;
        Ok(state
            .devices
            .iter()
            .find(|d| matches_filter(&session.filter, d.id.as_str(), d.name.as_str()))
            .cloned()
            .unwrap_or_else(DeviceDescription::empty))
    }

    fn uninitialize(&self, handle: SessionHandle) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state
            .sessions
            .remove(&handle.as_raw())
            .ok_or(AudioError::InvalidHandle(handle.as_raw()))?;
        state.uninitialized.push(handle);
        Ok(())
    }
}

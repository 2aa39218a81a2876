//! Binding to a native collaborator library.
//!
//! The library exports `AcInitialize`, `AcGetAttached` and `AcUnInitialize`
//! with the `system` calling convention. Its callbacks carry no user-data
//! pointer, so this binding routes them through one process-wide slot and
//! allows a single live session at a time.

use super::collaborator::{Collaborator, EventSink, LogSink, SessionHandle};
use super::device::{
    read_wide_cstr, to_wide_nul, AcDescription, AcStatus, AudioError, DeviceDescription,
    DeviceHint, RawEventCallback, RawLogCallback,
};
use libloading::Library;
use std::ffi::OsStr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

type InitializeFn = unsafe extern "system" fn(
    handle: *mut u64,
    device_filter: *const u16,
    event_callback: Option<RawEventCallback>,
    log_callback: Option<RawLogCallback>,
) -> i32;

type GetAttachedFn = unsafe extern "system" fn(handle: u64, description: *mut AcDescription) -> i32;

type UnInitializeFn = unsafe extern "system" fn(handle: u64) -> i32;

/// The three entry points of the contract.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub initialize: InitializeFn,
    pub get_attached: GetAttachedFn,
    pub uninitialize: UnInitializeFn,
}

struct CallbackSlot {
    on_event: EventSink,
    on_log: LogSink,
}

static ACTIVE_CALLBACKS: Mutex<Option<CallbackSlot>> = Mutex::new(None);

fn active_callbacks() -> MutexGuard<'static, Option<CallbackSlot>> {
    ACTIVE_CALLBACKS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

extern "system" fn event_trampoline(hint: u8) {
    let sink = active_callbacks()
        .as_ref()
        .map(|slot| Arc::clone(&slot.on_event));
    let Some(sink) = sink else {
        return;
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| match DeviceHint::try_from(hint) {
        Ok(hint) => sink(hint),
        Err(e) => warn!("Ignoring native event: {e}"),
    }));
    if result.is_err() {
        warn!("Event callback panicked");
    }
}

extern "system" fn log_trampoline(is_error: i32, line: *const u16) {
    let sink = active_callbacks()
        .as_ref()
        .map(|slot| Arc::clone(&slot.on_log));
    let Some(sink) = sink else {
        return;
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let line = unsafe { read_wide_cstr(line) }.unwrap_or_default();
        sink(is_error != 0, &line);
    }));
    if result.is_err() {
        warn!("Log callback panicked");
    }
}

/// Collaborator implemented by a dynamically loaded native library.
pub struct NativeCollaborator {
    entry_points: EntryPoints,
    // Keeps the entry points valid
    _library: Option<Library>,
}

impl NativeCollaborator {
    /// Load the library at `path` and resolve the contract's entry points.
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let unavailable = |e: libloading::Error| {
            AudioError::CollaboratorUnavailable(format!(
                "{}: {e}",
                path.to_string_lossy()
            ))
        };

        unsafe {
            let library = Library::new(path).map_err(unavailable)?;
            let entry_points = EntryPoints {
                initialize: *library
                    .get::<InitializeFn>(b"AcInitialize\0")
                    .map_err(unavailable)?,
                get_attached: *library
                    .get::<GetAttachedFn>(b"AcGetAttached\0")
                    .map_err(unavailable)?,
                uninitialize: *library
                    .get::<UnInitializeFn>(b"AcUnInitialize\0")
                    .map_err(unavailable)?,
            };
            debug!(path = %path.to_string_lossy(), "Native collaborator loaded");
            Ok(Self {
                entry_points,
                _library: Some(library),
            })
        }
    }

    /// Bind to entry points that are already resident in the process.
    ///
    /// # Safety
    /// The entry points must honour the contract for as long as the returned
    /// value is alive.
    pub unsafe fn from_entry_points(entry_points: EntryPoints) -> Self {
        Self {
            entry_points,
            _library: None,
        }
    }
}

impl Collaborator for NativeCollaborator {
    fn initialize(
        &self,
        filter: &str,
        on_event: EventSink,
        on_log: LogSink,
    ) -> Result<SessionHandle, AudioError> {
        {
            let mut slot = active_callbacks();
            if slot.is_some() {
                return Err(AudioError::SessionBusy);
            }
            *slot = Some(CallbackSlot { on_event, on_log });
        }

        // The slot lock is released: the library may call back during initialization
        let filter = to_wide_nul(filter);
        let mut raw_handle = 0u64;
        let code = unsafe {
            (self.entry_points.initialize)(
                &mut raw_handle,
                filter.as_ptr(),
                Some(event_trampoline),
                Some(log_trampoline),
            )
        };

        if let Err(e) = AcStatus::check(code, "AcInitialize", 0) {
            *active_callbacks() = None;
            return Err(e);
        }
        Ok(SessionHandle::from_raw(raw_handle))
    }

    fn query_attached(&self, handle: SessionHandle) -> Result<DeviceDescription, AudioError> {
        let mut raw = AcDescription::zeroed();
        let code = unsafe { (self.entry_points.get_attached)(handle.as_raw(), &mut raw) };
        AcStatus::check(code, "AcGetAttached", handle.as_raw())?;
        DeviceDescription::from_raw(&raw)
    }

    fn uninitialize(&self, handle: SessionHandle) -> Result<(), AudioError> {
        let code = unsafe { (self.entry_points.uninitialize)(handle.as_raw()) };
        // A rejected handle leaves the live session and its callbacks in place
        AcStatus::check(code, "AcUnInitialize", handle.as_raw())?;
        *active_callbacks() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::DeviceInfo;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::mpsc;

    static FAKE_EVENT: Mutex<Option<RawEventCallback>> = Mutex::new(None);
    static FAKE_VOLUME: AtomicU8 = AtomicU8::new(0);

    unsafe extern "system" fn fake_initialize(
        handle: *mut u64,
        device_filter: *const u16,
        event_callback: Option<RawEventCallback>,
        log_callback: Option<RawLogCallback>,
    ) -> i32 {
        let filter = read_wide_cstr(device_filter).unwrap_or_default();
        if filter == "unavailable" {
            return AcStatus::Unavailable as i32;
        }
        *FAKE_EVENT.lock().unwrap() = event_callback;
        if let Some(log) = log_callback {
            let line = to_wide_nul(&format!("initialized with {filter}"));
            log(0, line.as_ptr());
        }
        *handle = 7;
        0
    }

    unsafe extern "system" fn fake_get_attached(handle: u64, description: *mut AcDescription) -> i32 {
        if handle != 7 {
            return AcStatus::InvalidHandle as i32;
        }
        let volume = u16::from(FAKE_VOLUME.load(Ordering::SeqCst));
        *description = DeviceDescription::new("USB\\VID_1", "Headset", volume).to_raw();
        0
    }

    unsafe extern "system" fn fake_uninitialize(handle: u64) -> i32 {
        if handle != 7 {
            return AcStatus::InvalidHandle as i32;
        }
        *FAKE_EVENT.lock().unwrap() = None;
        0
    }

    fn fire(hint: u8) {
        let callback = *FAKE_EVENT.lock().unwrap();
        if let Some(callback) = callback {
            callback(hint);
        }
    }

    #[test]
    fn test_load_missing_library_is_unavailable() {
        let result = NativeCollaborator::load("definitely-not-a-real-audio-controller-library");
        assert!(matches!(
            result,
            Err(AudioError::CollaboratorUnavailable(_))
        ));
    }

    // Single test because the callback slot is process-wide
    #[test]
    fn test_session_through_entry_points() {
        let collab = unsafe {
            NativeCollaborator::from_entry_points(EntryPoints {
                initialize: fake_initialize,
                get_attached: fake_get_attached,
                uninitialize: fake_uninitialize,
            })
        };

        let (hint_tx, hint_rx) = mpsc::channel();
        let hint_tx = Mutex::new(hint_tx);
        let on_event: EventSink = Arc::new(move |hint: DeviceHint| {
            let _ = hint_tx.lock().unwrap().send(hint);
        });
        let (log_tx, log_rx) = mpsc::channel();
        let log_tx = Mutex::new(log_tx);
        let on_log: LogSink = Arc::new(move |is_error: bool, line: &str| {
            let _ = log_tx.lock().unwrap().send((is_error, line.to_string()));
        });

        let unavailable = collab.initialize("unavailable", Arc::clone(&on_event), Arc::clone(&on_log));
        assert!(matches!(
            unavailable,
            Err(AudioError::CollaboratorUnavailable(_))
        ));

        let handle = collab
            .initialize("USB", Arc::clone(&on_event), Arc::clone(&on_log))
            .unwrap();
        assert_eq!(handle.as_raw(), 7);
        assert_eq!(
            log_rx.try_recv().unwrap(),
            (false, "initialized with USB".to_string())
        );

        assert!(matches!(
            collab.initialize("USB", Arc::clone(&on_event), Arc::clone(&on_log)),
            Err(AudioError::SessionBusy)
        ));

        FAKE_VOLUME.store(50, Ordering::SeqCst);
        let device = DeviceInfo::from(collab.query_attached(handle).unwrap());
        assert_eq!(device.id, "USB\\VID_1");
        assert_eq!(device.volume, 50);

        fire(DeviceHint::VolumeChanged.as_byte());
        fire(9);
        assert_eq!(hint_rx.try_recv().unwrap(), DeviceHint::VolumeChanged);
        assert!(hint_rx.try_recv().is_err());

        assert!(matches!(
            collab.query_attached(SessionHandle::from_raw(1)),
            Err(AudioError::InvalidHandle(1))
        ));

        // Rejected teardown keeps the live session's callbacks
        assert!(matches!(
            collab.uninitialize(SessionHandle::from_raw(99)),
            Err(AudioError::InvalidHandle(99))
        ));
        event_trampoline(DeviceHint::Detached.as_byte());
        assert_eq!(hint_rx.try_recv().unwrap(), DeviceHint::Detached);

        collab.uninitialize(handle).unwrap();
        event_trampoline(DeviceHint::Attached.as_byte());
        assert!(hint_rx.try_recv().is_err());
        assert_eq!(Arc::strong_count(&on_event), 1);
    }
}

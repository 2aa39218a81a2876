//! C ABI export of the audio collaborator contract.
//!
//! Exposes `AcInitialize`, `AcGetAttached` and `AcUnInitialize` with the
//! `system` calling convention, backed by the built-in collaborator. All
//! functions use panic::catch_unwind to prevent Rust panics from unwinding
//! across the FFI boundary.

#![allow(non_snake_case)]

use audio_check_rs::audio::device::{read_wide_cstr, to_wide_nul, RawEventCallback, RawLogCallback};
use audio_check_rs::audio::monitor::DEFAULT_POLL_INTERVAL;
use audio_check_rs::audio::{
    builtin_collaborator, AcDescription, AcStatus, AudioError, Collaborator, DeviceHint,
    EventSink, LogSink, SessionHandle,
};
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Once, OnceLock};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Error Handling
// ============================================================================

thread_local! {
    static LAST_ERROR: RefCell<Option<(AcStatus, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: AcStatus, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Record `err` and return its status code.
fn fail(err: &AudioError) -> i32 {
    let code = AcStatus::from(err);
    set_last_error(code, err.to_string());
    code as i32
}

/// Run `body`, converting errors and panics into status codes.
fn guarded(operation: &str, body: impl FnOnce() -> Result<(), AudioError>) -> i32 {
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => AcStatus::Success as i32,
        Ok(Err(e)) => fail(&e),
        Err(_) => {
            set_last_error(AcStatus::Panic, format!("Panic during {operation}"));
            AcStatus::Panic as i32
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

static BACKEND: OnceLock<Result<Arc<dyn Collaborator>, String>> = OnceLock::new();
static LOGGING: Once = Once::new();

fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

fn backend() -> Result<Arc<dyn Collaborator>, AudioError> {
    BACKEND
        .get_or_init(|| {
            builtin_collaborator(DEFAULT_POLL_INTERVAL, false).map_err(|e| match e {
                AudioError::CollaboratorUnavailable(reason) => reason,
                other => other.to_string(),
            })
        })
        .clone()
        .map_err(AudioError::CollaboratorUnavailable)
}

fn event_sink(callback: Option<RawEventCallback>) -> EventSink {
    Arc::new(move |hint: DeviceHint| {
        if let Some(callback) = callback {
            callback(hint.as_byte());
        }
    })
}

fn log_sink(callback: Option<RawLogCallback>) -> LogSink {
    Arc::new(move |is_error: bool, line: &str| {
        if let Some(callback) = callback {
            let wide = to_wide_nul(line);
            callback(i32::from(is_error), wide.as_ptr());
        }
    })
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with AcFreeString.
fn alloc_c_string(s: &str) -> *mut c_char {
    // Interior NULs cannot cross the boundary
    let sanitized: String = s.chars().filter(|&c| c != '\0').collect();
    match CString::new(sanitized) {
        Ok(cs) => cs.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// FFI Functions - Contract
// ============================================================================

/// Open a session for devices whose name or identifier contains the filter.
///
/// # Arguments
/// * `handle` - Receives the session handle; written as 0 on failure
/// * `device_filter` - NUL-terminated UTF-16 filter; null or empty for no filter
/// * `event_callback` - Receives one-byte hints (0 Attached, 1 Detached, 2 VolumeChanged)
/// * `log_callback` - Receives `(is_error, message)` diagnostics
///
/// # Returns
/// 0 on success, negative status on failure.
///
/// # Safety
/// `handle` must be valid for writes. Callbacks may be invoked from another
/// thread until AcUnInitialize() returns.
#[no_mangle]
pub unsafe extern "system" fn AcInitialize(
    handle: *mut u64,
    device_filter: *const u16,
    event_callback: Option<RawEventCallback>,
    log_callback: Option<RawLogCallback>,
) -> i32 {
    init_logging();

    if handle.is_null() {
        return fail(&AudioError::InvalidArgument("handle"));
    }
    *handle = 0;

    let mut opened = 0u64;
    let status = guarded("AcInitialize", || {
        let filter = read_wide_cstr(device_filter).unwrap_or_default();
        let session = backend()?.initialize(
            &filter,
            event_sink(event_callback),
            log_sink(log_callback),
        )?;
        debug!(handle = %session, filter = %filter, "Session opened over C ABI");
        opened = session.as_raw();
        Ok(())
    });
    *handle = opened;
    status
}

/// Copy the attached device for `handle` into `description`.
///
/// An empty identifier means no matching device is attached.
///
/// # Safety
/// `description` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "system" fn AcGetAttached(handle: u64, description: *mut AcDescription) -> i32 {
    if description.is_null() {
        return fail(&AudioError::InvalidArgument("description"));
    }

    let mut raw = AcDescription::zeroed();
    let status = guarded("AcGetAttached", || {
        let attached = backend()?.query_attached(SessionHandle::from_raw(handle))?;
        raw = attached.to_raw();
        Ok(())
    });
    if status == AcStatus::Success as i32 {
        *description = raw;
    }
    status
}

/// Close the session. The callbacks are not invoked after this returns.
#[no_mangle]
pub extern "system" fn AcUnInitialize(handle: u64) -> i32 {
    guarded("AcUnInitialize", || {
        let result = backend()?.uninitialize(SessionHandle::from_raw(handle));
        if let Err(e) = &result {
            warn!(handle, "Failed to close session: {e}");
        }
        result
    })
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code on this thread, or 0 if the last call succeeded.
#[no_mangle]
pub extern "system" fn AcLastErrorCode() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message. Caller must free with AcFreeString().
/// Returns null if no error.
#[no_mangle]
pub extern "system" fn AcLastErrorMessage() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by AcLastErrorMessage() or AcVersion().
#[no_mangle]
pub unsafe extern "system" fn AcFreeString(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| {
        drop(CString::from_raw(ptr));
    });
}

/// Get the library version. Caller must free with AcFreeString().
#[no_mangle]
pub extern "system" fn AcVersion() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// Reads a string returned by this library, for tests and diagnostics
#[cfg(test)]
unsafe fn take_c_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let s = std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned();
    AcFreeString(ptr);
    Some(s)
}

// ============================================================================
// Tests
// ============================================================================

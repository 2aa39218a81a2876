//! Audio device data models.
//!
//! Defines the values that cross the collaborator boundary: notification
//! hints, fixed-capacity wide strings, the raw `AcDescription` layout, the
//! application-side projection, status codes and errors.

use std::fmt;
use thiserror::Error;

/// Capacity of the identifier buffer in UTF-16 units, NUL included.
pub const ID_CAPACITY: usize = 40;

/// Capacity of the display name buffer in UTF-16 units, NUL included.
pub const NAME_CAPACITY: usize = 128;

/// Scale applied to the endpoint master scalar (0.0 to 1.0).
pub const VOLUME_SCALE: f32 = 1000.0;

/// Event callback as seen across the C boundary.
pub type RawEventCallback = extern "system" fn(hint: u8);

/// Log callback as seen across the C boundary. `is_error` is a Win32 `BOOL`.
pub type RawLogCallback = extern "system" fn(is_error: i32, line: *const u16);

/// Notification pushed by the collaborator on its own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceHint {
    /// A device matching the session filter appeared
    Attached = 0,

    /// The attached device went away
    Detached = 1,

    /// The attached device's volume changed
    VolumeChanged = 2,
}

impl DeviceHint {
    /// Wire representation of the hint.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DeviceHint {
    type Error = AudioError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeviceHint::Attached),
            1 => Ok(DeviceHint::Detached),
            2 => Ok(DeviceHint::VolumeChanged),
            other => Err(AudioError::InvalidHint(other)),
        }
    }
}

impl fmt::Display for DeviceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceHint::Attached => "Attached",
            DeviceHint::Detached => "Detached",
            DeviceHint::VolumeChanged => "VolumeChanged",
        };
        f.write_str(name)
    }
}

/// A string that fits a `[u16; N]` buffer with its NUL terminator.
///
/// Holds at most `N - 1` UTF-16 units and never an interior NUL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FixedWideString<const N: usize> {
    value: String,
}

impl<const N: usize> FixedWideString<N> {
    /// Maximum number of UTF-16 units, excluding the terminator.
    pub const MAX_UNITS: usize = N - 1;

    /// Build from `s`, cutting at the first NUL or at capacity.
    ///
    /// Cuts only on character boundaries, so a surrogate pair is either
    /// kept whole or dropped.
    pub fn truncated(s: &str) -> Self {
        let mut units = 0;
        let mut end = 0;
        for (idx, ch) in s.char_indices() {
            if ch == '\0' || units + ch.len_utf16() > Self::MAX_UNITS {
                break;
            }
            units += ch.len_utf16();
            end = idx + ch.len_utf8();
        }
        Self {
            value: s[..end].to_owned(),
        }
    }

    /// Build from `s`, rejecting values that would not survive the wire.
    pub fn try_new(s: &str) -> Result<Self, AudioError> {
        if s.contains('\0') {
            return Err(AudioError::MarshalingFailure(format!(
                "string contains an interior NUL: {s:?}"
            )));
        }
        let units = s.encode_utf16().count();
        if units > Self::MAX_UNITS {
            return Err(AudioError::MarshalingFailure(format!(
                "string of {units} UTF-16 units exceeds capacity {}",
                Self::MAX_UNITS
            )));
        }
        Ok(Self {
            value: s.to_owned(),
        })
    }

    /// Decode a NUL-terminated buffer.
    pub fn from_wide(buffer: &[u16; N]) -> Result<Self, AudioError> {
        let len = buffer.iter().position(|&unit| unit == 0).ok_or_else(|| {
            AudioError::MarshalingFailure(format!("unterminated {}-unit buffer", N))
        })?;
        let value = String::from_utf16(&buffer[..len])
            .map_err(|e| AudioError::MarshalingFailure(e.to_string()))?;
        Ok(Self { value })
    }

    /// Encode into a zero-padded buffer.
    pub fn to_wide(&self) -> [u16; N] {
        let mut buffer = [0u16; N];
        for (slot, unit) in buffer.iter_mut().zip(self.value.encode_utf16()) {
            *slot = unit;
        }
        buffer
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<const N: usize> fmt::Display for FixedWideString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

pub type DeviceId = FixedWideString<ID_CAPACITY>;
pub type DeviceName = FixedWideString<NAME_CAPACITY>;

/// Raw device description, laid out exactly as the C contract expects.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AcDescription {
    pub guid: [u16; ID_CAPACITY],
    pub name: [u16; NAME_CAPACITY],
    pub volume: u16,
}

impl AcDescription {
    pub fn zeroed() -> Self {
        Self {
            guid: [0; ID_CAPACITY],
            name: [0; NAME_CAPACITY],
            volume: 0,
        }
    }
}

impl Default for AcDescription {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for AcDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcDescription")
            .field("guid", &String::from_utf16_lossy(trim_nul(&self.guid)))
            .field("name", &String::from_utf16_lossy(trim_nul(&self.name)))
            .field("volume", &self.volume)
            .finish()
    }
}

fn trim_nul(buffer: &[u16]) -> &[u16] {
    let len = buffer.iter().position(|&u| u == 0).unwrap_or(buffer.len());
    &buffer[..len]
}

/// Collaborator-side description of the attached device.
///
/// An empty identifier means no device is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub id: DeviceId,
    pub name: DeviceName,
    pub volume: u16,
}

impl DeviceDescription {
    /// Build a description, truncating both strings to capacity.
    pub fn new(id: &str, name: &str, volume: u16) -> Self {
        Self {
            id: DeviceId::truncated(id),
            name: DeviceName::truncated(name),
            volume,
        }
    }

    /// The "no device attached" description.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        !self.id.is_empty()
    }

    /// Decode a raw description copied out of the collaborator.
    pub fn from_raw(raw: &AcDescription) -> Result<Self, AudioError> {
        Ok(Self {
            id: DeviceId::from_wide(&raw.guid)?,
            name: DeviceName::from_wide(&raw.name)?,
            volume: raw.volume,
        })
    }

    pub fn to_raw(&self) -> AcDescription {
        AcDescription {
            guid: self.id.to_wide(),
            name: self.name.to_wide(),
            volume: self.volume,
        }
    }
}

/// Convert an endpoint master scalar to the contract's volume scale.
pub fn volume_from_scalar(scalar: f32) -> u16 {
    (scalar.clamp(0.0, 1.0) * VOLUME_SCALE).round() as u16
}

/// Application-side copy of the attached device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device identifier; empty when nothing is attached
    pub id: String,

    /// Human-readable device name
    pub name: String,

    /// Volume on the collaborator's scale
    pub volume: u16,
}

impl DeviceInfo {
    /// The projection returned when no device is attached.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        !self.id.is_empty()
    }
}

impl From<DeviceDescription> for DeviceInfo {
    fn from(description: DeviceDescription) -> Self {
        Self {
            id: description.id.into_string(),
            name: description.name.into_string(),
            volume: description.volume,
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, \"{}\", Volume {}", self.id, self.name, self.volume)
    }
}

/// Status codes shared by both sides of the C contract.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcStatus {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    Unavailable = -3,
    Marshaling = -4,
    Busy = -5,
    Panic = -99,
}

impl AcStatus {
    /// Map a status returned by a collaborator call on `handle` to a result.
    pub fn check(code: i32, operation: &'static str, handle: u64) -> Result<(), AudioError> {
        match code {
            0 => Ok(()),
            -1 => Err(AudioError::InvalidHandle(handle)),
            -2 => Err(AudioError::InvalidArgument(operation)),
            -3 => Err(AudioError::CollaboratorUnavailable(format!(
                "{operation} reported the collaborator as unavailable"
            ))),
            -4 => Err(AudioError::MarshalingFailure(format!(
                "{operation} could not marshal the device description"
            ))),
            -5 => Err(AudioError::SessionBusy),
            code => Err(AudioError::Status { operation, code }),
        }
    }
}

impl From<&AudioError> for AcStatus {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::CollaboratorUnavailable(_) => AcStatus::Unavailable,
            AudioError::MarshalingFailure(_) => AcStatus::Marshaling,
            AudioError::InvalidHint(_) => AcStatus::Marshaling,
            AudioError::InvalidHandle(_) => AcStatus::InvalidHandle,
            AudioError::InvalidArgument(_) => AcStatus::InvalidArgument,
            AudioError::SessionBusy => AcStatus::Busy,
            AudioError::Status { .. } => AcStatus::Unavailable,
            #[cfg(windows)]
            AudioError::WindowsError(_) => AcStatus::Unavailable,
        }
    }
}

/// Audio collaborator error types.
///
/// "No matching device" is not an error; it is an empty description.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Marshaling failure: {0}")]
    MarshalingFailure(String),

    #[error("Unknown device hint: {0}")]
    InvalidHint(u8),

    #[error("Invalid session handle: {0}")]
    InvalidHandle(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("A collaborator session is already active")]
    SessionBusy,

    #[error("{operation} failed with status {code}")]
    Status { operation: &'static str, code: i32 },

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[source] windows::core::Error),
}

/// NUL-terminated UTF-16 copy of `s`.
pub fn to_wide_nul(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Read a NUL-terminated UTF-16 string. Returns `None` for null pointers.
///
/// # Safety
/// `ptr` must be null or point to a readable NUL-terminated UTF-16 string.
pub unsafe fn read_wide_cstr(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    let units = std::slice::from_raw_parts(ptr, len);
    Some(String::from_utf16_lossy(units))
}

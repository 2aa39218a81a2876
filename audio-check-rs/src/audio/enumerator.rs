//! Device enumeration using Windows MMDevice API.
//!
//! Provides COM initialization and lookup of the attached device that
//! matches a session filter.

use super::device::{AudioError, DeviceDescription};
use super::endpoints::{select_attached, Endpoint, EndpointFlow};
use super::volume::VolumeController;
use tracing::debug;
use windows::core::GUID;
use windows::Win32::Devices::Properties::{DEVPKEY_Device_ContainerId, DEVPKEY_Device_FriendlyName};
use windows::Win32::Media::Audio::{
    eCapture, eRender, EDataFlow, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Container id reported by endpoints that are not plug-and-play devices.
pub const NO_PLUG_AND_PLAY_CONTAINER: &str = "{00000000-0000-0000-FFFF-FFFFFFFFFFFF}";

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            // Endpoint notifications arrive on COM worker threads
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(AudioError::WindowsError)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Device enumerator using Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new DeviceEnumerator.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    AudioError::CollaboratorUnavailable(format!(
                        "cannot create MMDeviceEnumerator: {e}"
                    ))
                })?;

            Ok(Self { enumerator })
        }
    }

    /// Data flows to search, render endpoints first.
    pub fn flows(include_capture: bool) -> Vec<EDataFlow> {
        if include_capture {
            vec![eRender, eCapture]
        } else {
            vec![eRender]
        }
    }

    /// Find the attached device matching `filter`.
    ///
    /// Endpoints are grouped by container; see [`select_attached`].
    pub fn find_attached(
        &self,
        filter: &str,
        flows: &[EDataFlow],
    ) -> Result<Option<DeviceDescription>, AudioError> {
        let mut endpoints = Vec::new();
        for &flow in flows {
            let endpoint_flow = if flow == eCapture {
                EndpointFlow::Capture
            } else {
                EndpointFlow::Render
            };
            let collection = unsafe {
                self.enumerator
                    .EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE)
                    .map_err(AudioError::WindowsError)?
            };
            let count = unsafe { collection.GetCount().map_err(AudioError::WindowsError)? };

            for i in 0..count {
                let device = unsafe { collection.Item(i).map_err(AudioError::WindowsError)? };
                if let Some(endpoint) = self.describe(&device, endpoint_flow)? {
                    endpoints.push(endpoint);
                }
            }
        }
        Ok(select_attached(filter, endpoints))
    }

    /// Describe an endpoint. `None` for endpoints that are not plug-and-play
    /// or expose no readable volume.
    fn describe(&self, device: &IMMDevice, flow: EndpointFlow) -> Result<Option<Endpoint>, AudioError> {
        let props: IPropertyStore = unsafe {
            device
                .OpenPropertyStore(STGM(0))
                .map_err(AudioError::WindowsError)?
        };

        let container = match Self::get_property(
            &props,
            DEVPKEY_Device_ContainerId.fmtid,
            DEVPKEY_Device_ContainerId.pid,
        ) {
            Some(container) if container.eq_ignore_ascii_case(NO_PLUG_AND_PLAY_CONTAINER) => {
                return Ok(None);
            }
            Some(container) => container,
            None => Self::endpoint_id(device)?,
        };

        let name = Self::get_property(
            &props,
            DEVPKEY_Device_FriendlyName.fmtid,
            DEVPKEY_Device_FriendlyName.pid,
        )
        .unwrap_or_else(|| "Unknown".to_string());

        let volume = match VolumeController::new(device).and_then(|ctrl| ctrl.get_scaled_volume()) {
            Ok(volume) => volume,
            Err(e) => {
                debug!(container, name, "Skipping endpoint without volume: {e}");
                return Ok(None);
            }
        };

        Ok(Some(Endpoint {
            container,
            name,
            flow,
            volume,
        }))
    }

    fn endpoint_id(device: &IMMDevice) -> Result<String, AudioError> {
        unsafe {
            let id = device.GetId().map_err(AudioError::WindowsError)?;
            id.to_string()
                .map_err(|e| AudioError::MarshalingFailure(e.to_string()))
        }
    }

    /// Read a string-convertible property from a device's property store.
    fn get_property(props: &IPropertyStore, fmtid: GUID, pid: u32) -> Option<String> {
        unsafe {
            // DEVPROPKEY fields as a PROPERTYKEY
            let key = PROPERTYKEY { fmtid, pid };

            let prop = props.GetValue(&key).ok()?;
            let s = prop.to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
    }

    /// Get the raw IMMDeviceEnumerator for notification registration.
    pub fn raw_enumerator(&self) -> &IMMDeviceEnumerator {
        &self.enumerator
    }
}

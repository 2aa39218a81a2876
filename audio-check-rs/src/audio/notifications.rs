//! Device change notifications using IMMNotificationClient.
//!
//! Every endpoint change wakes the session monitor, which re-probes and
//! works out which hint (if any) applies to its filter.

use super::device::AudioError;
use super::monitor::MonitorWaker;
use windows::core::{implement, PCWSTR};
use windows::Win32::Media::Audio::{
    EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient, IMMNotificationClient_Impl,
    DEVICE_STATE,
};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;
// Re-export windows_core so the implement macro can find it
#[allow(unused_imports)]
use windows_core;

/// Notification client that wakes a session monitor.
#[implement(IMMNotificationClient)]
pub struct DeviceNotificationClient {
    waker: MonitorWaker,
}

impl DeviceNotificationClient {
    /// Create a new notification client.
    pub fn new(waker: MonitorWaker) -> Self {
        Self { waker }
    }

    /// Register this notification client with an enumerator.
    /// Takes ownership of self because the COM interface needs to own the data.
    pub fn register(
        self,
        enumerator: &IMMDeviceEnumerator,
    ) -> Result<NotificationRegistration, AudioError> {
        unsafe {
            let client: IMMNotificationClient = self.into();
            enumerator
                .RegisterEndpointNotificationCallback(&client)
                .map_err(AudioError::WindowsError)?;
            Ok(NotificationRegistration {
                enumerator: enumerator.clone(),
                client,
            })
        }
    }
}

/// Unregisters the notification client on drop.
pub struct NotificationRegistration {
    enumerator: IMMDeviceEnumerator,
    client: IMMNotificationClient,
}

impl Drop for NotificationRegistration {
    fn drop(&mut self) {
        unsafe {
            let _ = self
                .enumerator
                .UnregisterEndpointNotificationCallback(&self.client);
        }
    }
}

impl IMMNotificationClient_Impl for DeviceNotificationClient_Impl {
    fn OnDeviceStateChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        self.waker.wake();
        Ok(())
    }

    fn OnDeviceAdded(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.waker.wake();
        Ok(())
    }

    fn OnDeviceRemoved(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.waker.wake();
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        _flow: EDataFlow,
        _role: ERole,
        _pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        self.waker.wake();
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        // Friendly name changes show up here
        self.waker.wake();
        Ok(())
    }
}

// Note: no IAudioEndpointVolumeCallback; the monitor polls volume instead.

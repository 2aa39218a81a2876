//! Built-in collaborator backend on the Windows Core Audio API.

use super::device::{AudioError, DeviceDescription};
use super::enumerator::{ComGuard, DeviceEnumerator};
use super::monitor::{EndpointProbe, MonitorWaker, ProbeFactory};
use super::notifications::{DeviceNotificationClient, NotificationRegistration};
use windows::Win32::Media::Audio::EDataFlow;

/// Creates [`WasapiProbe`]s on monitor threads.
pub struct WasapiProbeFactory {
    include_capture: bool,
}

impl WasapiProbeFactory {
    pub fn new(include_capture: bool) -> Self {
        Self { include_capture }
    }
}

impl ProbeFactory for WasapiProbeFactory {
    type Probe = WasapiProbe;

    fn create(&self, filter: &str, waker: MonitorWaker) -> Result<WasapiProbe, AudioError> {
        let com = ComGuard::new()?;
        let enumerator = DeviceEnumerator::new()?;
        let registration = DeviceNotificationClient::new(waker).register(enumerator.raw_enumerator())?;

        Ok(WasapiProbe {
            _registration: registration,
            enumerator,
            filter: filter.to_string(),
            flows: DeviceEnumerator::flows(self.include_capture),
            _com: com,
        })
    }
}

/// Endpoint probe owning one thread's COM objects.
pub struct WasapiProbe {
    // Field order is drop order: unregister, release the enumerator, then COM
    _registration: NotificationRegistration,
    enumerator: DeviceEnumerator,
    filter: String,
    flows: Vec<EDataFlow>,
    _com: ComGuard,
}

impl EndpointProbe for WasapiProbe {
    fn attached(&mut self) -> Result<Option<DeviceDescription>, AudioError> {
        self.enumerator.find_attached(&self.filter, &self.flows)
    }
}

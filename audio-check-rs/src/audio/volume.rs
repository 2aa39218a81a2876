//! Volume readout using IAudioEndpointVolume.

use super::device::{volume_from_scalar, AudioError};
use windows::Win32::Media::Audio::{Endpoints::IAudioEndpointVolume, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Volume reader for a specific device.
pub struct VolumeController {
    endpoint_volume: IAudioEndpointVolume,
}

impl VolumeController {
    /// Create a new VolumeController for the given device.
    pub fn new(device: &IMMDevice) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(AudioError::WindowsError)?;

            Ok(Self { endpoint_volume })
        }
    }

    /// Get the current volume level (0.0 to 1.0).
    pub fn get_volume(&self) -> Result<f32, AudioError> {
        unsafe {
            self.endpoint_volume
                .GetMasterVolumeLevelScalar()
                .map_err(AudioError::WindowsError)
        }
    }

    /// Get the current mute state.
    pub fn get_mute(&self) -> Result<bool, AudioError> {
        unsafe {
            let muted = self
                .endpoint_volume
                .GetMute()
                .map_err(AudioError::WindowsError)?;
            Ok(muted.as_bool())
        }
    }

    /// Get the current volume on the contract's 0 to 1000 scale; 0 when muted.
    pub fn get_scaled_volume(&self) -> Result<u16, AudioError> {
        if self.get_mute()? {
            return Ok(0);
        }
        self.get_volume().map(volume_from_scalar)
    }
}

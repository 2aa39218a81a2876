//! Grouping of audio endpoints into devices.
//!
//! A headset exposes a render and a capture endpoint under one container id.
//! Endpoints sharing a container become one device whose name joins the
//! distinct endpoint names with `/`. The attached device is the matching
//! device with the lowest container id, independent of enumeration order.

use super::collaborator::matches_filter;
use super::device::{DeviceDescription, DeviceId, DeviceName};
use std::collections::{BTreeMap, BTreeSet};

pub const NAME_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointFlow {
    Render,
    Capture,
}

/// One active endpoint as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub container: String,
    pub name: String,
    pub flow: EndpointFlow,
    /// 0 when muted
    pub volume: u16,
}

#[derive(Default)]
struct DeviceGroup {
    names: BTreeSet<String>,
    render_volume: Option<u16>,
    capture_volume: Option<u16>,
}

impl DeviceGroup {
    fn add(&mut self, endpoint: Endpoint) {
        self.names.extend(
            endpoint
                .name
                .split(NAME_SEPARATOR)
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
        let slot = match endpoint.flow {
            EndpointFlow::Render => &mut self.render_volume,
            EndpointFlow::Capture => &mut self.capture_volume,
        };
        slot.get_or_insert(endpoint.volume);
    }

    fn name(&self) -> String {
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.join(&NAME_SEPARATOR.to_string())
    }

    /// Render volume when the device plays audio, capture volume otherwise.
    fn volume(&self) -> u16 {
        self.render_volume.or(self.capture_volume).unwrap_or(0)
    }
}

/// The attached device among `endpoints` for `filter`.
pub fn select_attached(
    filter: &str,
    endpoints: impl IntoIterator<Item = Endpoint>,
) -> Option<DeviceDescription> {
    let mut devices: BTreeMap<String, DeviceGroup> = BTreeMap::new();
    for endpoint in endpoints {
        devices
            .entry(endpoint.container.clone())
            .or_default()
            .add(endpoint);
    }

    devices.into_iter().find_map(|(container, group)| {
        let name = group.name();
        matches_filter(filter, &container, &name).then(|| DeviceDescription {
            id: DeviceId::truncated(&container),
            name: DeviceName::truncated(&name),
            volume: group.volume(),
        })
    })
}

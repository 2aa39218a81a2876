//! View state: the displayed device snapshot and the refresh action.
//!
//! A `ViewState` lives on the dispatcher thread. Collaborator hints reach it
//! through [`crate::app::Dispatcher`], never directly from the collaborator
//! thread.

use crate::audio::{DeviceHint, DeviceInfo};
use crate::service::DeviceService;
use tracing::{debug, warn};

/// What the view currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    NoDevice,
    Attached(DeviceInfo),
}

impl DeviceState {
    fn from_query(device: DeviceInfo) -> Self {
        if device.is_attached() {
            DeviceState::Attached(device)
        } else {
            DeviceState::NoDevice
        }
    }
}

/// Published to subscribers after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// The displayed device changed. `None` when no device is attached.
    Device(Option<DeviceInfo>),
    /// Whether the refresh action is currently permitted.
    RefreshEnabled(bool),
}

type Listener = Box<dyn FnMut(&ViewChange)>;

pub struct ViewState {
    service: DeviceService,
    title: String,
    state: DeviceState,
    listeners: Vec<Listener>,
}

impl ViewState {
    /// Build the view and query the current device once.
    pub fn new(service: DeviceService, title: String) -> Self {
        let state = query(&service);
        Self {
            service,
            title,
            state,
            listeners: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        match &self.state {
            DeviceState::Attached(device) => Some(device),
            DeviceState::NoDevice => None,
        }
    }

    pub fn can_refresh(&self) -> bool {
        matches!(self.state, DeviceState::Attached(_))
    }

    /// Register a listener for view changes.
    pub fn subscribe(&mut self, listener: impl FnMut(&ViewChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// React to a collaborator hint.
    pub fn apply_hint(&mut self, hint: DeviceHint) {
        debug!(%hint, "Applying device hint");
        let next = match hint {
            DeviceHint::Attached | DeviceHint::VolumeChanged => query(&self.service),
            DeviceHint::Detached => DeviceState::NoDevice,
        };
        self.transition(next);
    }

    /// Re-query the attached device. Returns `false` when refresh is disabled.
    pub fn refresh(&mut self) -> bool {
        if !self.can_refresh() {
            debug!("Refresh ignored: no device attached");
            return false;
        }
        let next = query(&self.service);
        self.transition(next);
        true
    }

    fn transition(&mut self, next: DeviceState) {
        let changed = next != self.state;
        self.state = next;

        if changed {
            let device = self.device().cloned();
            self.publish(ViewChange::Device(device));
        }
        let enabled = self.can_refresh();
        self.publish(ViewChange::RefreshEnabled(enabled));
    }

    fn publish(&mut self, change: ViewChange) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

fn query(service: &DeviceService) -> DeviceState {
    match service.current_device() {
        Ok(device) => DeviceState::from_query(device),
        Err(e) => {
            warn!("Device query failed: {e}");
            DeviceState::NoDevice
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeCollaborator;
    use crate::audio::{DeviceDescription, EventSink};
    use crate::service::log_sink;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn view_over(fake: &Arc<FakeCollaborator>, filter: &str) -> ViewState {
        let on_event: EventSink = Arc::new(|_: DeviceHint| {});
        let service =
            DeviceService::initialize(fake.clone(), filter, on_event, log_sink()).unwrap();
        ViewState::new(service, crate::title::derive_title(Some(filter)))
    }

    fn recorded(view: &mut ViewState) -> Rc<RefCell<Vec<ViewChange>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        view.subscribe(move |change| sink.borrow_mut().push(change.clone()));
        changes
    }

    #[test]
    fn test_usb_scenario_enables_refresh() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new(
            "USB\\VID_046D&PID_0A44",
            "USB Headset",
            50,
        )]);
        let view = view_over(&fake, "USB");

        let device = view.device().unwrap();
        assert_eq!(device.id, "USB\\VID_046D&PID_0A44");
        assert_eq!(device.volume, 50);
        assert!(view.can_refresh());
        assert!(view.title().contains("USB"));
    }

    #[test]
    fn test_no_device_at_startup_disables_refresh() {
        let fake = FakeCollaborator::new();
        let mut view = view_over(&fake, "");
        assert_eq!(*view.state(), DeviceState::NoDevice);
        assert!(!view.can_refresh());

        let queries = fake.query_count();
        let changes = recorded(&mut view);
        assert!(!view.refresh());
        assert_eq!(fake.query_count(), queries);
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_detached_hint_clears_device() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let mut view = view_over(&fake, "");
        let changes = recorded(&mut view);
        let queries = fake.query_count();

        view.apply_hint(DeviceHint::Detached);
        assert_eq!(*view.state(), DeviceState::NoDevice);
        assert_eq!(fake.query_count(), queries);
        assert_eq!(
            *changes.borrow(),
            vec![ViewChange::Device(None), ViewChange::RefreshEnabled(false)]
        );

        // Already cleared: only the refresh state is republished
        view.apply_hint(DeviceHint::Detached);
        assert_eq!(changes.borrow().len(), 3);
        assert_eq!(changes.borrow()[2], ViewChange::RefreshEnabled(false));
    }

    #[test]
    fn test_volume_hint_reflects_latest_volume() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let mut view = view_over(&fake, "");
        let changes = recorded(&mut view);

        fake.set_volume("{A}", 730);
        view.apply_hint(DeviceHint::VolumeChanged);
        assert_eq!(view.device().unwrap().volume, 730);

        let expected = DeviceInfo {
            id: "{A}".to_string(),
            name: "Speakers".to_string(),
            volume: 730,
        };
        assert_eq!(
            *changes.borrow(),
            vec![
                ViewChange::Device(Some(expected)),
                ViewChange::RefreshEnabled(true),
            ]
        );
    }

    #[test]
    fn test_attached_hint_after_hot_plug() {
        let fake = FakeCollaborator::new();
        let mut view = view_over(&fake, "headset");
        assert!(!view.can_refresh());

        fake.attach(DeviceDescription::new("USB\\VID_1", "Gaming Headset", 400));
        view.apply_hint(DeviceHint::Attached);
        assert_eq!(view.device().unwrap().name, "Gaming Headset");
        assert!(view.can_refresh());
    }

    #[test]
    fn test_attached_hint_with_empty_requery_is_no_device() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let mut view = view_over(&fake, "");

        fake.detach_all();
        view.apply_hint(DeviceHint::Attached);
        assert_eq!(*view.state(), DeviceState::NoDevice);
        assert!(!view.can_refresh());
    }

    #[test]
    fn test_query_failure_falls_back_to_no_device() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let mut view = view_over(&fake, "");
        assert!(view.can_refresh());

        fake.set_query_failure(true);
        assert!(view.refresh());
        assert_eq!(*view.state(), DeviceState::NoDevice);
        assert!(!view.refresh());
    }

    #[test]
    fn test_refresh_without_change_publishes_refresh_state_only() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let mut view = view_over(&fake, "");
        let changes = recorded(&mut view);

        assert!(view.refresh());
        assert_eq!(*changes.borrow(), vec![ViewChange::RefreshEnabled(true)]);
    }
}

//! Owner-thread dispatcher.
//!
//! Collaborator callbacks and console input arrive on their own threads.
//! They post [`AppMessage`]s through a [`DispatcherHandle`]; the thread that
//! calls [`Dispatcher::run`] owns the [`ViewState`] and applies them in order.

use crate::audio::{DeviceHint, EventSink};
use crate::view::ViewState;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMessage {
    /// Hint pushed by the collaborator
    Device(DeviceHint),
    /// User asked for a refresh
    Refresh,
    Quit,
}

/// Message queue drained on the owning thread.
pub struct Dispatcher {
    sender: Sender<AppMessage>,
    receiver: Receiver<AppMessage>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// A handle other threads use to post messages.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            sender: Arc::new(Mutex::new(self.sender.clone())),
        }
    }

    /// Apply messages to `view` until `Quit` arrives or every handle is gone.
    pub fn run(self, view: &mut ViewState) {
        let Self { sender, receiver } = self;
        // Only outstanding handles keep the queue open from here on
        drop(sender);

        info!(title = view.title(), "Dispatcher running");
        for message in receiver.iter() {
            debug!(?message, "Dispatching");
            match message {
                AppMessage::Device(hint) => view.apply_hint(hint),
                AppMessage::Refresh => {
                    view.refresh();
                }
                AppMessage::Quit => break,
            }
        }
        info!("Dispatcher stopped");
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct DispatcherHandle {
    sender: Arc<Mutex<Sender<AppMessage>>>,
}

impl DispatcherHandle {
    /// Queue `message`. Returns `false` once the dispatcher has stopped.
    pub fn post(&self, message: AppMessage) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender.send(message).is_ok()
    }
}

/// Event sink that forwards collaborator hints to the dispatcher.
pub fn event_sink(handle: DispatcherHandle) -> EventSink {
    Arc::new(move |hint: DeviceHint| {
        if !handle.post(AppMessage::Device(hint)) {
            warn!(%hint, "Dropped device hint: dispatcher stopped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeCollaborator;
    use crate::audio::{DeviceDescription, DeviceInfo};
    use crate::service::{log_sink, DeviceService};
    use crate::view::{DeviceState, ViewChange};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;

    fn view_with_dispatcher(
        fake: &Arc<FakeCollaborator>,
        dispatcher: &Dispatcher,
    ) -> ViewState {
        let service = DeviceService::initialize(
            fake.clone(),
            "",
            event_sink(dispatcher.handle()),
            log_sink(),
        )
        .unwrap();
        ViewState::new(service, "test".to_string())
    }

    #[test]
    fn test_messages_applied_in_order_until_quit() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let mut view = view_with_dispatcher(&fake, &dispatcher);

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        view.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        assert!(handle.post(AppMessage::Device(DeviceHint::Detached)));
        assert!(handle.post(AppMessage::Device(DeviceHint::Attached)));
        assert!(handle.post(AppMessage::Quit));
        // Never applied: the loop stops at Quit
        assert!(handle.post(AppMessage::Device(DeviceHint::Detached)));

        dispatcher.run(&mut view);

        let expected = DeviceInfo {
            id: "{A}".to_string(),
            name: "Speakers".to_string(),
            volume: 10,
        };
        assert_eq!(
            *changes.borrow(),
            vec![
                ViewChange::Device(None),
                ViewChange::RefreshEnabled(false),
                ViewChange::Device(Some(expected.clone())),
                ViewChange::RefreshEnabled(true),
            ]
        );
        assert_eq!(*view.state(), DeviceState::Attached(expected));
    }

    #[test]
    fn test_collaborator_hint_crosses_threads() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let mut view = view_with_dispatcher(&fake, &dispatcher);

        fake.set_volume("{A}", 900);
        let emitter = Arc::clone(&fake);
        thread::spawn(move || {
            emitter.emit(DeviceHint::VolumeChanged);
            handle.post(AppMessage::Quit);
        })
        .join()
        .unwrap();

        dispatcher.run(&mut view);
        assert_eq!(view.device().unwrap().volume, 900);
    }

    #[test]
    fn test_refresh_message_requeries() {
        let fake = FakeCollaborator::with_devices(vec![DeviceDescription::new("{A}", "Speakers", 10)]);
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let mut view = view_with_dispatcher(&fake, &dispatcher);

        fake.set_volume("{A}", 20);
        handle.post(AppMessage::Refresh);
        handle.post(AppMessage::Quit);
        dispatcher.run(&mut view);
        assert_eq!(view.device().unwrap().volume, 20);
    }

    #[test]
    fn test_post_after_stop_reports_false() {
        let fake = FakeCollaborator::new();
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let mut view = view_with_dispatcher(&fake, &dispatcher);

        handle.post(AppMessage::Quit);
        dispatcher.run(&mut view);

        assert!(!handle.post(AppMessage::Refresh));
        // The service's event sink must not panic either
        fake.emit(DeviceHint::Attached);
    }
}

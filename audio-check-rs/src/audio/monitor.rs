//! Built-in collaborator driven by an endpoint probe.
//!
//! Each session runs one monitor thread. The probe is created on that thread
//! (platform APIs such as COM are per-thread), takes a snapshot of the
//! attached device, and is re-run whenever the platform wakes the monitor or
//! the poll interval elapses. Snapshot differences become hints.

use super::collaborator::{hint_between, Collaborator, EventSink, LogSink, SessionHandle};
use super::device::{AudioError, DeviceDescription};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Default interval between probes when no platform notification arrives.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reports the device currently attached for one session's filter.
pub trait EndpointProbe {
    fn attached(&mut self) -> Result<Option<DeviceDescription>, AudioError>;
}

impl<F> EndpointProbe for F
where
    F: FnMut() -> Result<Option<DeviceDescription>, AudioError>,
{
    fn attached(&mut self) -> Result<Option<DeviceDescription>, AudioError> {
        self()
    }
}

/// Creates a probe on the monitor thread.
pub trait ProbeFactory: Send + Sync + 'static {
    type Probe: EndpointProbe;

    /// `waker` may be handed to platform notification callbacks to trigger
    /// an immediate re-probe.
    fn create(&self, filter: &str, waker: MonitorWaker) -> Result<Self::Probe, AudioError>;
}

enum MonitorSignal {
    Wake,
    Stop,
}

/// Requests an immediate re-probe of a session.
#[derive(Clone)]
pub struct MonitorWaker {
    sender: Sender<MonitorSignal>,
}

impl MonitorWaker {
    pub fn wake(&self) {
        let _ = self.sender.send(MonitorSignal::Wake);
    }
}

type Snapshot = Arc<Mutex<Option<DeviceDescription>>>;

struct MonitorSession {
    snapshot: Snapshot,
    control: Sender<MonitorSignal>,
    thread: Option<JoinHandle<()>>,
    _on_event: EventSink,
    _on_log: LogSink,
}

impl MonitorSession {
    fn stop(mut self) {
        let _ = self.control.send(MonitorSignal::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio monitor thread panicked");
            }
        }
    }
}

/// Everything the monitor thread needs.
struct MonitorContext<F> {
    factory: Arc<F>,
    filter: String,
    waker: MonitorWaker,
    signals: Receiver<MonitorSignal>,
    snapshot: Snapshot,
    on_event: EventSink,
    on_log: LogSink,
    poll_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn describe(snapshot: Option<&DeviceDescription>) -> String {
    match snapshot {
        Some(device) => format!("{} \"{}\" volume {}", device.id, device.name, device.volume),
        None => "none".to_string(),
    }
}

fn run_monitor<F: ProbeFactory>(
    context: MonitorContext<F>,
    ready: Sender<Result<(), AudioError>>,
) {
    let MonitorContext {
        factory,
        filter,
        waker,
        signals,
        snapshot,
        on_event,
        on_log,
        poll_interval,
    } = context;

    let mut probe = match factory.create(&filter, waker) {
        Ok(probe) => probe,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut current = match probe.attached() {
        Ok(initial) => initial,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    on_log(
        false,
        &format!("Monitoring started, attached device: {}", describe(current.as_ref())),
    );
    *lock(&snapshot) = current.clone();
    let _ = ready.send(Ok(()));

    loop {
        match signals.recv_timeout(poll_interval) {
            Ok(MonitorSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(MonitorSignal::Wake) | Err(RecvTimeoutError::Timeout) => {}
        }

        let next = match probe.attached() {
            Ok(next) => next,
            Err(e) => {
                on_log(true, &format!("Endpoint probe failed: {e}"));
                continue;
            }
        };

        let hint = hint_between(current.as_ref(), next.as_ref());
        // Publish before notifying so a re-query from the hint sees the new state
        *lock(&snapshot) = next.clone();
        current = next;

        if let Some(hint) = hint {
            on_log(
                false,
                &format!("Event caught: {hint}. Device: {}", describe(current.as_ref())),
            );
            on_event(hint);
        }
    }

    on_log(false, "Monitoring stopped");
}

/// Collaborator backed by a [`ProbeFactory`].
pub struct MonitoredCollaborator<F: ProbeFactory> {
    factory: Arc<F>,
    poll_interval: Duration,
    sessions: Mutex<HashMap<u64, MonitorSession>>,
    next_handle: AtomicU64,
}

impl<F: ProbeFactory> MonitoredCollaborator<F> {
    pub fn new(factory: F, poll_interval: Duration) -> Self {
        Self {
            factory: Arc::new(factory),
            poll_interval,
            sessions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl<F: ProbeFactory> Collaborator for MonitoredCollaborator<F> {
    fn initialize(
        &self,
        filter: &str,
        on_event: EventSink,
        on_log: LogSink,
    ) -> Result<SessionHandle, AudioError> {
        let (control, signals) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let snapshot: Snapshot = Arc::new(Mutex::new(None));

        let context = MonitorContext {
            factory: Arc::clone(&self.factory),
            filter: filter.to_string(),
            waker: MonitorWaker {
                sender: control.clone(),
            },
            signals,
            snapshot: Arc::clone(&snapshot),
            on_event: Arc::clone(&on_event),
            on_log: Arc::clone(&on_log),
            poll_interval: self.poll_interval,
        };

        let thread = thread::Builder::new()
            .name("audio-monitor".to_string())
            .spawn(move || run_monitor(context, ready_tx))
            .map_err(|e| AudioError::CollaboratorUnavailable(e.to_string()))?;

        let started = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(AudioError::CollaboratorUnavailable(
                "monitor thread exited during start-up".to_string(),
            )),
        };
        if let Err(e) = started {
            let _ = thread.join();
            return Err(e);
        }

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        debug!(handle, filter, "Monitor session started");
        lock(&self.sessions).insert(
            handle,
            MonitorSession {
                snapshot,
                control,
                thread: Some(thread),
                _on_event: on_event,
                _on_log: on_log,
            },
        );
        Ok(SessionHandle::from_raw(handle))
    }

    fn query_attached(&self, handle: SessionHandle) -> Result<DeviceDescription, AudioError> {
        let sessions = lock(&self.sessions);
        let session = sessions
            .get(&handle.as_raw())
            .ok_or(AudioError::InvalidHandle(handle.as_raw()))?;
        let snapshot = lock(&session.snapshot).clone();
        Ok(snapshot.unwrap_or_else(DeviceDescription::empty))
    }

    fn uninitialize(&self, handle: SessionHandle) -> Result<(), AudioError> {
        let session = lock(&self.sessions)
            .remove(&handle.as_raw())
            .ok_or(AudioError::InvalidHandle(handle.as_raw()))?;
        session.stop();
        debug!(handle = handle.as_raw(), "Monitor session stopped");
        Ok(())
    }
}

impl<F: ProbeFactory> Drop for MonitoredCollaborator<F> {
    fn drop(&mut self) {
        let sessions: Vec<MonitorSession> = lock(&self.sessions).drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.stop();
        }
    }
}

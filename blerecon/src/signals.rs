//! Central dispatcher for everything that can happen asynchronously to a device: property
//! changes, notifications, interface add/remove, and the synthetic read/write events the GATT
//! Walker and characteristic API feed in so they correlate alongside real wire events.

use bluez_async::BluetoothEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Where a [`SignalCapture`] came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalSource {
    Read,
    Write,
    Notification,
    PropertyChange,
    InterfacesAdded,
    InterfacesRemoved,
}

/// An immutable record of one event the Signal Hub observed or was told about.
#[derive(Clone, Debug)]
pub struct SignalCapture {
    pub path: String,
    pub interface: String,
    pub signal_name: String,
    pub source: SignalSource,
    pub at: Instant,
}

impl SignalCapture {
    pub fn new(path: impl Into<String>, interface: impl Into<String>, signal_name: impl Into<String>, source: SignalSource) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            signal_name: signal_name.into(),
            source,
            at: Instant::now(),
        }
    }

    fn from_bluetooth_event(event: &BluetoothEvent) -> Self {
        match event {
            BluetoothEvent::Adapter { id, .. } => Self::new(
                id.to_string(),
                "org.bluez.Adapter1",
                "PropertiesChanged",
                SignalSource::PropertyChange,
            ),
            BluetoothEvent::Device { id, event } => {
                let source = if matches!(event, bluez_async::DeviceEvent::Discovered) {
                    SignalSource::InterfacesAdded
                } else {
                    SignalSource::PropertyChange
                };
                Self::new(id.to_string(), "org.bluez.Device1", "PropertiesChanged", source)
            }
            BluetoothEvent::Characteristic { id, .. } => Self::new(
                id.to_string(),
                "org.bluez.GattCharacteristic1",
                "PropertiesChanged",
                SignalSource::Notification,
            ),
        }
    }
}

/// A bounded rolling window of recent [`SignalCapture`]s with correlation helpers.
pub struct SignalCorrelator {
    window: Duration,
    captures: Mutex<VecDeque<SignalCapture>>,
}

impl SignalCorrelator {
    pub fn new(window: Duration) -> Self {
        assert!(window >= Duration::from_secs(30), "correlation window must be at least 30s");
        Self {
            window,
            captures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, capture: SignalCapture) {
        let mut captures = self.captures.lock().unwrap();
        captures.push_back(capture);
        let cutoff = Instant::now() - self.window;
        while let Some(front) = captures.front() {
            if front.at < cutoff {
                captures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Return every retained capture within `±window` of `capture`'s timestamp whose path is a
    /// prefix or suffix of `capture.path`, excluding `capture` itself.
    pub fn related(&self, capture: &SignalCapture, window: Duration) -> Vec<SignalCapture> {
        let captures = self.captures.lock().unwrap();
        captures
            .iter()
            .filter(|other| {
                other.at != capture.at || other.path != capture.path || other.signal_name != capture.signal_name
            })
            .filter(|other| {
                let delta = if other.at >= capture.at {
                    other.at - capture.at
                } else {
                    capture.at - other.at
                };
                delta <= window
            })
            .filter(|other| path_related(&other.path, &capture.path))
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<SignalCapture> {
        self.captures.lock().unwrap().iter().cloned().collect()
    }
}

fn path_related(a: &str, b: &str) -> bool {
    a != b && (a.starts_with(b) || b.starts_with(a))
}

/// Handle returned by the `register_*` methods, for later bookkeeping. Registrations are never
/// automatically torn down; a long-lived hub that registers per-device callbacks and never
/// dismisses them will keep calling them for devices that are long gone, so holding on to this
/// value matters.
pub type RegistrationId = u64;

type CaptureCallback = dyn Fn(&SignalCapture) + Send + Sync;

struct Trigger {
    path: String,
    source: SignalSource,
    callback: Arc<CaptureCallback>,
}

/// Fan-in dispatcher: turns a stream of [`BluetoothEvent`]s plus synthetic read/write captures
/// into a single correlated history, and republishes everything on a broadcast channel for
/// per-device or per-characteristic subscribers.
pub struct SignalHub {
    correlator: SignalCorrelator,
    sender: broadcast::Sender<SignalCapture>,
    triggers: Mutex<HashMap<RegistrationId, Trigger>>,
    next_registration: AtomicU64,
}

impl SignalHub {
    pub fn new(window: Duration) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            correlator: SignalCorrelator::new(window),
            sender,
            triggers: Mutex::new(HashMap::new()),
            next_registration: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalCapture> {
        self.sender.subscribe()
    }

    pub fn handle_event(&self, event: &BluetoothEvent) {
        let capture = SignalCapture::from_bluetooth_event(event);
        self.dispatch(capture);
    }

    /// Feed in a synthetic capture for a read or write the core performed itself, so it
    /// correlates alongside wire-originated notifications and property changes.
    pub fn handle_synthetic(&self, path: impl Into<String>, interface: impl Into<String>, source: SignalSource) {
        let capture = SignalCapture::new(path, interface, "Synthetic", source);
        self.dispatch(capture);
    }

    fn dispatch(&self, capture: SignalCapture) {
        self.correlator.record(capture.clone());
        self.run_triggers(&capture);
        let _ = self.sender.send(capture);
    }

    fn run_triggers(&self, capture: &SignalCapture) {
        let triggers = self.triggers.lock().unwrap();
        for trigger in triggers.values() {
            if trigger.source == capture.source && trigger.path == capture.path {
                (trigger.callback)(capture);
            }
        }
    }

    fn register(&self, path: impl Into<String>, source: SignalSource, callback: Arc<CaptureCallback>) -> RegistrationId {
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        self.triggers.lock().unwrap().insert(
            id,
            Trigger {
                path: path.into(),
                source,
                callback,
            },
        );
        id
    }

    /// Remove a registration made by any of the `register_*` methods. A no-op if `id` is unknown
    /// or was already removed.
    pub fn unregister(&self, id: RegistrationId) {
        self.triggers.lock().unwrap().remove(&id);
    }

    /// Call `callback` synchronously, from inside [`handle_event`](Self::handle_event), every
    /// time a notification arrives for `path`. Mirrors `StartNotify`'s delivery model: BlueZ also
    /// calls back into the subscriber rather than requiring a poll.
    pub fn register_notification_callback(
        &self,
        path: impl Into<String>,
        callback: impl Fn(&SignalCapture) + Send + Sync + 'static,
    ) -> RegistrationId {
        self.register(path, SignalSource::Notification, Arc::new(callback))
    }

    /// Call `callback` whenever a synthetic read capture is recorded for `path` (see
    /// [`handle_synthetic`](Self::handle_synthetic)).
    pub fn register_read_trigger(
        &self,
        path: impl Into<String>,
        callback: impl Fn(&SignalCapture) + Send + Sync + 'static,
    ) -> RegistrationId {
        self.register(path, SignalSource::Read, Arc::new(callback))
    }

    /// Call `callback` whenever a synthetic write capture is recorded for `path`.
    pub fn register_write_trigger(
        &self,
        path: impl Into<String>,
        callback: impl Fn(&SignalCapture) + Send + Sync + 'static,
    ) -> RegistrationId {
        self.register(path, SignalSource::Write, Arc::new(callback))
    }

    /// Subscribe to property-change captures for exactly `path`, filtering out every other path
    /// and source this hub sees. Spawns a forwarding task that runs until either side of the
    /// returned channel is dropped.
    pub fn watch_property(&self, path: impl Into<String>) -> broadcast::Receiver<SignalCapture> {
        let path = path.into();
        let mut upstream = self.subscribe();
        let (downstream, receiver) = broadcast::channel(64);
        tokio::spawn(async move {
            while let Ok(capture) = upstream.recv().await {
                if capture.source == SignalSource::PropertyChange && capture.path == path {
                    if downstream.send(capture).is_err() {
                        break;
                    }
                }
            }
        });
        receiver
    }

    /// Every retained property-change capture for `path`, oldest first.
    pub fn get_property_history(&self, path: &str) -> Vec<SignalCapture> {
        self.correlator
            .history()
            .into_iter()
            .filter(|capture| capture.source == SignalSource::PropertyChange && capture.path == path)
            .collect()
    }

    /// Collect every capture this hub sees over the next `duration`, regardless of path or
    /// source, useful for "what happened while I ran this command" diagnostics. The returned
    /// handle resolves once the window elapses.
    pub fn start_timed_capture(&self, duration: Duration) -> tokio::task::JoinHandle<Vec<SignalCapture>> {
        let mut upstream = self.subscribe();
        tokio::spawn(async move {
            let mut captures = Vec::new();
            let deadline = tokio::time::Instant::now() + duration;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, upstream.recv()).await {
                    Ok(Ok(capture)) => captures.push(capture),
                    Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                    Ok(Err(broadcast::error::RecvError::Closed)) => break,
                    Err(_) => break,
                }
            }
            captures
        })
    }

    pub fn related(&self, capture: &SignalCapture, window: Duration) -> Vec<SignalCapture> {
        self.correlator.related(capture, window)
    }

    pub fn history(&self) -> Vec<SignalCapture> {
        self.correlator.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_excludes_self_and_unrelated_paths() {
        let correlator = SignalCorrelator::new(Duration::from_secs(30));
        let parent = SignalCapture::new("/org/bluez/hci0/dev_AA", "org.bluez.Device1", "PropertiesChanged", SignalSource::PropertyChange);
        correlator.record(parent.clone());
        let child = SignalCapture::new(
            "/org/bluez/hci0/dev_AA/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            "PropertiesChanged",
            SignalSource::Notification,
        );
        correlator.record(child.clone());
        let unrelated = SignalCapture::new("/org/bluez/hci0/dev_BB", "org.bluez.Device1", "PropertiesChanged", SignalSource::PropertyChange);
        correlator.record(unrelated);

        let related = correlator.related(&child, Duration::from_secs(30));
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].path, parent.path);
    }

    #[test]
    fn read_write_captures_correlate_like_wire_events() {
        let hub = SignalHub::new(Duration::from_secs(30));
        hub.handle_synthetic(
            "/org/bluez/hci0/dev_AA/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            SignalSource::Read,
        );
        let history = hub.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, SignalSource::Read);
    }

    #[test]
    fn notification_callback_fires_only_for_matching_path_and_source() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hub = SignalHub::new(Duration::from_secs(30));
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        hub.register_notification_callback("/org/bluez/hci0/dev_AA/service0001/char0002", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        hub.handle_synthetic(
            "/org/bluez/hci0/dev_AA/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            SignalSource::Notification,
        );
        hub.handle_synthetic(
            "/org/bluez/hci0/dev_AA/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            SignalSource::Read,
        );
        hub.handle_synthetic(
            "/org/bluez/hci0/dev_BB/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            SignalSource::Notification,
        );

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_stops_future_callbacks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hub = SignalHub::new(Duration::from_secs(30));
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let id = hub.register_read_trigger("/org/bluez/hci0/dev_AA/service0001/char0002", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        hub.unregister(id);

        hub.handle_synthetic(
            "/org/bluez/hci0/dev_AA/service0001/char0002",
            "org.bluez.GattCharacteristic1",
            SignalSource::Read,
        );

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn watch_property_only_forwards_property_changes_for_the_path() {
        let hub = SignalHub::new(Duration::from_secs(30));
        let mut watcher = hub.watch_property("/org/bluez/hci0/dev_AA");

        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::PropertyChange);
        hub.handle_synthetic("/org/bluez/hci0/dev_BB", "org.bluez.Device1", SignalSource::PropertyChange);
        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::Read);

        let first = watcher.recv().await.unwrap();
        assert_eq!(first.path, "/org/bluez/hci0/dev_AA");
        assert_eq!(first.source, SignalSource::PropertyChange);
        assert!(watcher.try_recv().is_err());
    }

    #[test]
    fn get_property_history_filters_by_path_and_source() {
        let hub = SignalHub::new(Duration::from_secs(30));
        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::PropertyChange);
        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::Read);
        hub.handle_synthetic("/org/bluez/hci0/dev_BB", "org.bluez.Device1", SignalSource::PropertyChange);

        let history = hub.get_property_history("/org/bluez/hci0/dev_AA");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, SignalSource::PropertyChange);
    }

    #[tokio::test]
    async fn start_timed_capture_collects_everything_in_the_window() {
        let hub = Arc::new(SignalHub::new(Duration::from_secs(30)));
        let handle = hub.start_timed_capture(Duration::from_millis(50));

        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::Read);
        hub.handle_synthetic("/org/bluez/hci0/dev_AA", "org.bluez.Device1", SignalSource::Write);

        let captures = handle.await.unwrap();
        assert_eq!(captures.len(), 2);
    }
}

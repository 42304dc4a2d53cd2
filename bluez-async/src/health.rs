//! Watches the BlueZ daemon for stalls (slow or absent replies) and restarts (the well-known bus
//! name changing owner), and republishes both as broadcast events for the Recovery Manager and
//! other interested layers.

use dbus::nonblock::stdintf::org_freedesktop_dbus::ObjectManager;
use dbus::nonblock::{Proxy, SyncConnection};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const BLUEZ_BUS_NAME: &str = "org.bluez";
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(3);
const STALL_RATE_LIMIT: Duration = Duration::from_secs(60);

/// An event published by the Health Monitor.
#[derive(Clone, Debug)]
pub enum HealthEvent {
    /// A lightweight enumeration call against the daemon did not complete within the check
    /// timeout.
    Stall { latency: Duration },
    /// The daemon's well-known bus name changed owner, i.e. `bluetoothd` restarted.
    Restarted,
    /// The daemon transitioned between reachable and unreachable.
    Availability { available: bool },
}

/// Periodically probes the daemon and publishes [`HealthEvent`]s.
pub struct HealthMonitor {
    connection: Arc<SyncConnection>,
    check_interval: Duration,
    check_timeout: Duration,
    sender: broadcast::Sender<HealthEvent>,
}

impl HealthMonitor {
    pub fn new(connection: Arc<SyncConnection>) -> Self {
        Self::with_interval(connection, DEFAULT_CHECK_INTERVAL, DEFAULT_CHECK_TIMEOUT)
    }

    pub fn with_interval(
        connection: Arc<SyncConnection>,
        check_interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            connection,
            check_interval,
            check_timeout,
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.sender.subscribe()
    }

    /// Run the monitor loop forever. Intended to be `tokio::spawn`ed by the caller alongside the
    /// D-Bus resource future.
    pub async fn run(&self) {
        let mut last_available = true;
        let mut last_stall_emitted: Option<Instant> = None;
        let mut interval = tokio::time::interval(self.check_interval);
        loop {
            interval.tick().await;
            let probe_start = Instant::now();
            let proxy = Proxy::new(
                BLUEZ_BUS_NAME,
                "/",
                self.check_timeout,
                self.connection.clone(),
            );
            let result = tokio::time::timeout(self.check_timeout, proxy.get_managed_objects()).await;
            let latency = probe_start.elapsed();
            match result {
                Ok(Ok(_)) => {
                    if !last_available {
                        last_available = true;
                        let _ = self.sender.send(HealthEvent::Availability { available: true });
                        let _ = self.sender.send(HealthEvent::Restarted);
                    }
                }
                _ => {
                    let should_emit = last_stall_emitted
                        .map(|at| at.elapsed() >= STALL_RATE_LIMIT)
                        .unwrap_or(true);
                    if should_emit {
                        let _ = self.sender.send(HealthEvent::Stall { latency });
                        last_stall_emitted = Some(Instant::now());
                    }
                    if last_available {
                        last_available = false;
                        let _ = self
                            .sender
                            .send(HealthEvent::Availability { available: false });
                    }
                }
            }
        }
    }
}

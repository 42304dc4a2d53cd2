//! Staged recovery escalation: when a device or the daemon itself gets wedged, try the cheapest
//! fix first and only escalate once its attempt budget and cooldown have been exhausted.
//! Reconnect -> reset interfaces -> power-cycle the adapter -> reset the controller -> restart
//! the daemon. Attempt counters are per-device, per-stage bookkeeping, not a success streak: they
//! only clear when `bluetoothd` itself restarts (see [`RecoveryManager::clear_all`] and
//! [`RecoveryManager::watch_health`]), since a success at one stage says nothing about whether the
//! next wedge will need the same stage again.

use async_trait::async_trait;
use bluez_async::{AdapterId, DeviceId, HealthEvent};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::config::RecoveryConfig;
use crate::error::CoreError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum RecoveryStage {
    Reconnect,
    ResetInterfaces,
    PowerCycle,
    ControllerReset,
    DaemonRestart,
}

impl RecoveryStage {
    fn all_in_order() -> [RecoveryStage; 5] {
        [
            RecoveryStage::Reconnect,
            RecoveryStage::ResetInterfaces,
            RecoveryStage::PowerCycle,
            RecoveryStage::ControllerReset,
            RecoveryStage::DaemonRestart,
        ]
    }

    fn max_attempts(self, config: &RecoveryConfig) -> u32 {
        match self {
            RecoveryStage::Reconnect => config.reconnect_max_attempts,
            RecoveryStage::ResetInterfaces => config.reset_interfaces_max_attempts,
            RecoveryStage::PowerCycle => config.power_cycle_max_attempts,
            RecoveryStage::ControllerReset => config.controller_reset_max_attempts,
            RecoveryStage::DaemonRestart => config.daemon_restart_max_attempts,
        }
    }

    fn cooldown(self, config: &RecoveryConfig) -> Duration {
        let secs = match self {
            RecoveryStage::Reconnect => config.reconnect_cooldown_secs,
            RecoveryStage::ResetInterfaces => config.reset_interfaces_cooldown_secs,
            RecoveryStage::PowerCycle => config.power_cycle_cooldown_secs,
            RecoveryStage::ControllerReset => config.controller_reset_cooldown_secs,
            RecoveryStage::DaemonRestart => config.daemon_restart_cooldown_secs,
        };
        Duration::from_secs(secs)
    }
}

/// The operations the Recovery Manager drives. Implemented against a real host for production
/// use; tests supply a fake that just records which stage was invoked.
#[async_trait]
pub trait RecoveryActions: Send + Sync {
    async fn reconnect(&self, device: &DeviceId) -> Result<(), CoreError>;
    async fn reset_interfaces(&self, adapter: &AdapterId) -> Result<(), CoreError>;
    async fn power_cycle(&self, adapter: &AdapterId) -> Result<(), CoreError>;
    async fn controller_reset(&self, adapter: &AdapterId) -> Result<(), CoreError>;
    async fn daemon_restart(&self) -> Result<(), CoreError>;
}

#[derive(Clone, Debug)]
pub struct RecoveryEvent {
    pub device: DeviceId,
    pub stage: RecoveryStage,
    pub succeeded: bool,
}

#[derive(Default)]
struct StageState {
    attempts: u32,
    last_attempt: Option<Instant>,
}

pub struct RecoveryManager {
    config: RecoveryConfig,
    state: Mutex<HashMap<(DeviceId, RecoveryStage), StageState>>,
    sender: broadcast::Sender<RecoveryEvent>,
}

impl RecoveryManager {
    pub fn new(config: RecoveryConfig) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            config,
            state: Mutex::new(HashMap::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.sender.subscribe()
    }

    /// Work out the next eligible stage for `device` and run it. Returns `Ok(None)` if every
    /// stage's attempt budget is currently exhausted and still cooling down.
    pub async fn recover(
        &self,
        device: &DeviceId,
        adapter: &AdapterId,
        actions: &dyn RecoveryActions,
    ) -> Result<Option<RecoveryStage>, CoreError> {
        let stage = match self.next_eligible_stage(device) {
            Some(stage) => stage,
            None => return Ok(None),
        };

        self.record_attempt(device, stage);

        let result = match stage {
            RecoveryStage::Reconnect => actions.reconnect(device).await,
            RecoveryStage::ResetInterfaces => actions.reset_interfaces(adapter).await,
            RecoveryStage::PowerCycle => actions.power_cycle(adapter).await,
            RecoveryStage::ControllerReset => actions.controller_reset(adapter).await,
            RecoveryStage::DaemonRestart => actions.daemon_restart().await,
        };

        let succeeded = result.is_ok();
        let _ = self.sender.send(RecoveryEvent {
            device: device.clone(),
            stage,
            succeeded,
        });
        result.map(|()| Some(stage))
    }

    fn next_eligible_stage(&self, device: &DeviceId) -> Option<RecoveryStage> {
        let state = self.state.lock().unwrap();
        for stage in RecoveryStage::all_in_order() {
            let entry = state.get(&(device.clone(), stage));
            let exhausted = entry
                .map(|s| s.attempts >= stage.max_attempts(&self.config))
                .unwrap_or(false);
            if !exhausted {
                return Some(stage);
            }
            let cooled_down = entry
                .and_then(|s| s.last_attempt)
                .map(|at| at.elapsed() >= stage.cooldown(&self.config))
                .unwrap_or(true);
            if cooled_down {
                return Some(stage);
            }
        }
        None
    }

    fn record_attempt(&self, device: &DeviceId, stage: RecoveryStage) {
        let mut state = self.state.lock().unwrap();
        let entry = state.entry((device.clone(), stage)).or_default();
        let cooled_down = entry
            .last_attempt
            .map(|at| at.elapsed() >= stage.cooldown(&self.config))
            .unwrap_or(true);
        if cooled_down && entry.attempts >= stage.max_attempts(&self.config) {
            entry.attempts = 0;
        }
        entry.attempts += 1;
        entry.last_attempt = Some(Instant::now());
    }

    /// Clear every stage's attempt bookkeeping for every device. The only legitimate trigger for
    /// this is `bluetoothd` itself restarting: a fresh daemon process has no memory of how wedged
    /// the old one was, so counters accumulated against the old process no longer mean anything.
    pub fn clear_all(&self) {
        self.state.lock().unwrap().clear();
    }

    /// Subscribe to a [`HealthMonitor`](bluez_async::health::HealthMonitor)'s event stream and
    /// call [`clear_all`](Self::clear_all) whenever it reports [`HealthEvent::Restarted`]. Spawns
    /// a task that runs until the sender side is dropped; the returned handle is given to the
    /// caller to manage alongside the rest of its background tasks.
    pub fn watch_health(
        self: std::sync::Arc<Self>,
        mut health_events: broadcast::Receiver<HealthEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match health_events.recv().await {
                    Ok(HealthEvent::Restarted) => self.clear_all(),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingActions {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecoveryActions for FailingActions {
        async fn reconnect(&self, _device: &DeviceId) -> Result<(), CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::ConnectionFailed {
                address: "AA:BB".into(),
                reason: "nope".into(),
            })
        }
        async fn reset_interfaces(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn power_cycle(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn controller_reset(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn daemon_restart(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn device() -> DeviceId {
        DeviceId::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    fn adapter() -> AdapterId {
        AdapterId::new("/org/bluez/hci0")
    }

    #[tokio::test]
    async fn escalates_after_attempt_budget_exhausted() {
        let mut config = RecoveryConfig::default();
        config.reconnect_max_attempts = 2;
        config.reconnect_cooldown_secs = 9999;
        let manager = RecoveryManager::new(config);
        let actions = FailingActions {
            calls: AtomicUsize::new(0),
        };

        let first = manager.recover(&device(), &adapter(), &actions).await.unwrap();
        let second = manager.recover(&device(), &adapter(), &actions).await.unwrap();
        let third = manager.recover(&device(), &adapter(), &actions).await.unwrap();

        assert_eq!(first, Some(RecoveryStage::Reconnect));
        assert_eq!(second, Some(RecoveryStage::Reconnect));
        assert_eq!(third, Some(RecoveryStage::ResetInterfaces));
        assert_eq!(actions.calls.load(Ordering::SeqCst), 2);
    }

    struct SucceedingActions;

    #[async_trait]
    impl RecoveryActions for SucceedingActions {
        async fn reconnect(&self, _device: &DeviceId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn reset_interfaces(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn power_cycle(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn controller_reset(&self, _adapter: &AdapterId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn daemon_restart(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn success_does_not_reset_stage_counters() {
        let mut config = RecoveryConfig::default();
        config.reconnect_max_attempts = 1;
        config.reconnect_cooldown_secs = 9999;
        let manager = RecoveryManager::new(config);

        let first = manager
            .recover(&device(), &adapter(), &SucceedingActions)
            .await
            .unwrap();
        assert_eq!(first, Some(RecoveryStage::Reconnect));

        // Reconnect's single-attempt budget is exhausted and still cooling down, so a second
        // recovery pass for the same device escalates rather than retrying reconnect, even
        // though the first reconnect succeeded.
        let second = manager
            .recover(&device(), &adapter(), &SucceedingActions)
            .await
            .unwrap();
        assert_eq!(second, Some(RecoveryStage::ResetInterfaces));
    }

    #[tokio::test]
    async fn clear_all_resets_every_stage() {
        let mut config = RecoveryConfig::default();
        config.reconnect_max_attempts = 1;
        config.reconnect_cooldown_secs = 9999;
        let manager = RecoveryManager::new(config);

        manager.recover(&device(), &adapter(), &SucceedingActions).await.unwrap();
        manager.clear_all();

        let after_clear = manager
            .recover(&device(), &adapter(), &SucceedingActions)
            .await
            .unwrap();
        assert_eq!(after_clear, Some(RecoveryStage::Reconnect));
    }

    #[tokio::test]
    async fn watch_health_clears_on_restart_event() {
        let mut config = RecoveryConfig::default();
        config.reconnect_max_attempts = 1;
        config.reconnect_cooldown_secs = 9999;
        let manager = std::sync::Arc::new(RecoveryManager::new(config));

        manager.recover(&device(), &adapter(), &SucceedingActions).await.unwrap();

        let (health_sender, health_receiver) = broadcast::channel(4);
        let handle = manager.clone().watch_health(health_receiver);
        health_sender.send(HealthEvent::Restarted).unwrap();
        drop(health_sender);
        handle.await.unwrap();

        let after_restart = manager
            .recover(&device(), &adapter(), &SucceedingActions)
            .await
            .unwrap();
        assert_eq!(after_restart, Some(RecoveryStage::Reconnect));
    }
}

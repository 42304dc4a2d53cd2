//! Tracks one device's progress through connect/pair/resolve-services, and owns the retry policy
//! for getting there: exponential backoff on `connect`, with an automatic pair-then-retry when
//! the daemon reports the device needs authentication.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use bluez_async::facade::BluetoothFacade;
use bluez_async::{BluetoothError, DeviceId, DeviceInfo};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::pairing::agent::{AgentIoHandler, PairingState, PairingStateMachine};
use crate::pairing::bond_store::{BondStore, PairingData};
use crate::taxonomy::{ResultCode, TaxonomyConfig};

/// Routes an auto-pair through the Pairing Agent subsystem instead of calling `Device1.Pair`
/// directly: `states` tracks the negotiation, `io` decides whether an unsolicited pairing is
/// allowed to proceed, and a successful pairing is persisted to `bonds`.
pub struct PairingAgent {
    pub io: Arc<dyn AgentIoHandler>,
    pub states: Arc<PairingStateMachine>,
    pub bonds: Arc<BondStore>,
}

/// Where a device currently sits in the connect/pair/resolve pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    Known,
    Connecting,
    Connected,
    ServicesResolving,
    ServicesResolved,
    Disconnecting,
    Disconnected,
}

#[derive(Clone, Debug)]
pub struct LifecycleEvent {
    pub device: DeviceId,
    pub state: LifecycleState,
}

/// Drives one device through connection, retrying transient failures and auto-pairing when the
/// daemon reports the device requires it.
pub struct DeviceLifecycle {
    sender: broadcast::Sender<LifecycleEvent>,
    pairing: Option<PairingAgent>,
}

impl Default for DeviceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLifecycle {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(128);
        Self { sender, pairing: None }
    }

    /// Build a `DeviceLifecycle` whose auto-pair branch is routed through the Pairing Agent
    /// subsystem: `io` gates whether an unsolicited pairing is allowed to proceed and drives the
    /// `org.bluez.Agent1` prompts, `states` tracks the negotiation, and a successful pairing is
    /// persisted to `bonds`.
    pub fn with_pairing_agent(
        io: Arc<dyn AgentIoHandler>,
        states: Arc<PairingStateMachine>,
        bonds: Arc<BondStore>,
    ) -> Self {
        let (sender, _) = broadcast::channel(128);
        Self {
            sender,
            pairing: Some(PairingAgent { io, states, bonds }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    fn emit(&self, device: &DeviceId, state: LifecycleState) {
        let _ = self.sender.send(LifecycleEvent {
            device: device.clone(),
            state,
        });
    }

    /// Connect to `device`, retrying with exponential backoff (200ms initial, 2.0x multiplier,
    /// capped at 1.6s) on transient failures, and auto-pairing if the daemon reports the device
    /// is not authorized before retrying once more. Resolves once `ServicesResolved` is true or
    /// the retry budget (`max_elapsed`) is exhausted.
    pub async fn connect_and_resolve(
        &self,
        facade: &dyn BluetoothFacade,
        device: &DeviceId,
        taxonomy: &TaxonomyConfig,
        max_elapsed: Duration,
    ) -> Result<DeviceInfo, CoreError> {
        self.emit(device, LifecycleState::Connecting);

        let mut backoff = connect_backoff(max_elapsed);
        let mut already_paired_this_attempt = false;

        loop {
            // BlueZ's `Connect` can wedge on a device it still thinks is half-connected from a
            // previous attempt; a no-op `Disconnect` first clears that state even when nothing
            // is actually connected.
            let _ = facade.disconnect(device).await;

            match facade.connect(device).await {
                Ok(()) => break,
                Err(err) => {
                    let code = taxonomy.classify(&err);
                    if matches!(code, ResultCode::NotAuthorized) && !already_paired_this_attempt {
                        already_paired_this_attempt = true;
                        self.pair_device(facade, device).await?;
                        continue;
                    }
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(connect_error(device, &err)),
                    }
                }
            }
        }

        self.emit(device, LifecycleState::Connected);
        self.emit(device, LifecycleState::ServicesResolving);

        let info = wait_for_services_resolved(facade, device, max_elapsed).await?;
        self.emit(device, LifecycleState::ServicesResolved);
        Ok(info)
    }

    pub async fn disconnect(
        &self,
        facade: &dyn BluetoothFacade,
        device: &DeviceId,
    ) -> Result<(), CoreError> {
        self.emit(device, LifecycleState::Disconnecting);
        facade.disconnect(device).await?;
        self.emit(device, LifecycleState::Disconnected);
        Ok(())
    }

    /// Pair with `device`, routed through the Pairing Agent subsystem when one is configured
    /// ([`Self::with_pairing_agent`]): the agent's I/O policy is asked whether to proceed before
    /// `Device1.Pair` is called, and a successful pairing is persisted to the bond store. Falls
    /// back to calling `Device1.Pair` directly when no agent is configured.
    async fn pair_device(&self, facade: &dyn BluetoothFacade, device: &DeviceId) -> Result<(), CoreError> {
        let agent = match &self.pairing {
            Some(agent) => agent,
            None => return facade.pair(device).await.map_err(CoreError::Bluetooth),
        };

        let _ = agent.states.transition(device, PairingState::Initiated);
        let _ = agent.states.transition(device, PairingState::AuthorizationRequested);

        if !agent.io.request_authorization(device).await {
            let _ = agent.states.transition(device, PairingState::Cancelled);
            agent.io.cancel(device).await;
            let _ = agent.states.transition(device, PairingState::Idle);
            return Err(CoreError::Cancelled);
        }

        let _ = agent.states.transition(device, PairingState::Bonding);
        match facade.pair(device).await {
            Ok(()) => {
                let _ = agent.states.transition(device, PairingState::Complete);
                if let Ok(info) = facade.get_device_info(device).await {
                    let bond = PairingData {
                        address: info.mac_address,
                        paired: true,
                        trusted: info.trusted,
                        bonded_at_unix_secs: unix_now(),
                    };
                    let _ = agent.bonds.store(&bond).await;
                }
                let _ = agent.states.transition(device, PairingState::Idle);
                Ok(())
            }
            Err(err) => {
                let _ = agent.states.transition(device, PairingState::Failed);
                let _ = agent.states.transition(device, PairingState::Idle);
                Err(CoreError::Bluetooth(err))
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn connect_backoff(max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        multiplier: 2.0,
        max_interval: Duration::from_millis(1600),
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    }
}

fn connect_error(device: &DeviceId, err: &BluetoothError) -> CoreError {
    CoreError::ConnectionFailed {
        address: device.to_string(),
        reason: err.to_string(),
    }
}

/// Poll `GetDeviceInfo` until `services_resolved` is set or the retry budget runs out. BlueZ
/// resolves services asynchronously after `Connect` returns, so there's no single call that
/// blocks until they're ready.
async fn wait_for_services_resolved(
    facade: &dyn BluetoothFacade,
    device: &DeviceId,
    max_elapsed: Duration,
) -> Result<DeviceInfo, CoreError> {
    let deadline = tokio::time::Instant::now() + max_elapsed;
    loop {
        let info = facade.get_device_info(device).await?;
        if info.services_resolved {
            return Ok(info);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CoreError::ServicesNotResolved);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bluez_async::{
        AdapterId, CharacteristicId, CharacteristicInfo, DescriptorId, DescriptorInfo,
        DiscoveryFilter, MacAddress, ServiceId, ServiceInfo,
    };
    use dbus::arg::PropMap;
    use std::str::FromStr;

    #[test]
    fn backoff_caps_at_expected_interval() {
        let backoff = connect_backoff(Duration::from_secs(5));
        assert_eq!(backoff.initial_interval, Duration::from_millis(200));
        assert_eq!(backoff.max_interval, Duration::from_millis(1600));
        assert_eq!(backoff.multiplier, 2.0);
    }

    fn device() -> DeviceId {
        DeviceId::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    fn device_info(device: &DeviceId, trusted: bool) -> DeviceInfo {
        DeviceInfo {
            id: device.clone(),
            mac_address: MacAddress::from_str("AA:BB:CC:DD:EE:FF").unwrap(),
            class: None,
            appearance: None,
            name: None,
            alias: String::new(),
            paired: true,
            trusted,
            connected: true,
            rssi: None,
            tx_power: None,
            manufacturer_data: Default::default(),
            service_data: Default::default(),
            services: Vec::new(),
            services_resolved: true,
        }
    }

    /// Just enough of [`BluetoothFacade`] to exercise pairing: `pair` always succeeds,
    /// `get_device_info` reports the device as trusted. Every other method is unreachable from
    /// the pairing path.
    struct PairingOnlyFacade;

    #[async_trait]
    impl BluetoothFacade for PairingOnlyFacade {
        async fn list_adapters(&self) -> Result<Vec<AdapterId>, BluetoothError> {
            unimplemented!()
        }
        async fn start_discovery(&self, _filter: &DiscoveryFilter) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn stop_discovery(&self) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn get_devices(&self) -> Result<Vec<DeviceInfo>, BluetoothError> {
            unimplemented!()
        }
        async fn get_device_info(&self, id: &DeviceId) -> Result<DeviceInfo, BluetoothError> {
            Ok(device_info(id, true))
        }
        async fn get_services(&self, _device: &DeviceId) -> Result<Vec<ServiceInfo>, BluetoothError> {
            unimplemented!()
        }
        async fn get_characteristics(
            &self,
            _service: &ServiceId,
        ) -> Result<Vec<CharacteristicInfo>, BluetoothError> {
            unimplemented!()
        }
        async fn get_descriptors(
            &self,
            _characteristic: &CharacteristicId,
        ) -> Result<Vec<DescriptorInfo>, BluetoothError> {
            unimplemented!()
        }
        async fn connect(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn disconnect(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
            Ok(())
        }
        async fn pair(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
            Ok(())
        }
        async fn set_trusted(&self, _id: &DeviceId, _trusted: bool) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn read_characteristic_value(
            &self,
            _id: &CharacteristicId,
        ) -> Result<Vec<u8>, BluetoothError> {
            unimplemented!()
        }
        async fn write_characteristic_value(
            &self,
            _id: &CharacteristicId,
            _value: Vec<u8>,
        ) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn read_descriptor_value_with_options(
            &self,
            _id: &DescriptorId,
            _options: PropMap,
        ) -> Result<Vec<u8>, BluetoothError> {
            unimplemented!()
        }
        async fn get_descriptor_value_property(
            &self,
            _id: &DescriptorId,
        ) -> Result<Vec<u8>, BluetoothError> {
            unimplemented!()
        }
        async fn write_descriptor_value(
            &self,
            _id: &DescriptorId,
            _value: Vec<u8>,
        ) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn start_notify(&self, _id: &CharacteristicId) -> Result<(), BluetoothError> {
            unimplemented!()
        }
        async fn stop_notify(&self, _id: &CharacteristicId) -> Result<(), BluetoothError> {
            unimplemented!()
        }
    }

    fn temp_bond_dir(label: &str) -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("blerecon-lifecycle-test-{}-{:?}", label, std::thread::current().id()));
        dir
    }

    #[tokio::test]
    async fn auto_pair_authorized_persists_a_bond() {
        let dir = temp_bond_dir("authorized");
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let bonds = Arc::new(BondStore::new(dir.clone(), Duration::from_secs(60)));
        let states = Arc::new(PairingStateMachine::new());
        let io: Arc<dyn AgentIoHandler> = Arc::new(crate::pairing::io::AutoAcceptIoHandler);
        let lifecycle = DeviceLifecycle::with_pairing_agent(io, states.clone(), bonds.clone());

        lifecycle
            .pair_device(&PairingOnlyFacade, &device())
            .await
            .unwrap();

        assert_eq!(states.state(&device()), PairingState::Idle);
        let stored = bonds
            .load(&MacAddress::from_str("AA:BB:CC:DD:EE:FF").unwrap())
            .await
            .unwrap();
        assert!(stored.is_some());
        assert!(stored.unwrap().paired);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn auto_pair_rejected_by_policy_does_not_call_pair() {
        let dir = temp_bond_dir("rejected");
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let bonds = Arc::new(BondStore::new(dir.clone(), Duration::from_secs(60)));
        let states = Arc::new(PairingStateMachine::new());
        let io: Arc<dyn AgentIoHandler> = Arc::new(crate::pairing::io::ProgrammaticIoHandler::default());
        let lifecycle = DeviceLifecycle::with_pairing_agent(io, states.clone(), bonds.clone());

        let err = lifecycle
            .pair_device(&PairingOnlyFacade, &device())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(states.state(&device()), PairingState::Idle);
        let stored = bonds
            .load(&MacAddress::from_str("AA:BB:CC:DD:EE:FF").unwrap())
            .await
            .unwrap();
        assert!(stored.is_none());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

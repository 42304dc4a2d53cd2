//! The four scan modes the rest of the crate is driven through. Each wraps the same
//! connect-then-walk pipeline with a different timeout/retry envelope, and bruteforce layers an
//! exhaustive handle probe on top of a pokey walk.

use bluez_async::facade::BluetoothFacade;
use bluez_async::{CharacteristicId, DeviceId, MacAddress, Transport};
use std::time::Duration;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gatt::map::{AttributeMap, CharacteristicAttribute, LandmineMap, PermissionMap};
use crate::gatt::{classify_walk_errors, walker};
use crate::lifecycle::DeviceLifecycle;
use crate::pairing::agent::{AgentIoHandler, PairingStateMachine};
use crate::pairing::bond_store::BondStore;
use crate::taxonomy::TaxonomyConfig;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScanMode {
    /// Single connection attempt, tight overall budget: half for discovery, a quarter each for
    /// connect and service resolution.
    Passive,
    /// Persistent retries with exponential back-off and a long overall deadline.
    Naggy,
    /// Extended timeouts at every stage, plus a mandatory full GATT walk regardless of flags.
    Pokey,
    /// A pokey pass followed by exhaustive handle probing over a configurable range.
    Bruteforce,
}

pub struct ScanEnvelope {
    pub discovery_timeout: Duration,
    pub connect_timeout: Duration,
    pub services_timeout: Duration,
}

impl ScanMode {
    pub fn envelope(self, overall: Duration) -> ScanEnvelope {
        match self {
            ScanMode::Passive => ScanEnvelope {
                discovery_timeout: overall / 2,
                connect_timeout: overall / 4,
                services_timeout: overall / 4,
            },
            ScanMode::Naggy => ScanEnvelope {
                discovery_timeout: overall,
                connect_timeout: overall,
                services_timeout: overall,
            },
            ScanMode::Pokey | ScanMode::Bruteforce => ScanEnvelope {
                discovery_timeout: overall * 2,
                connect_timeout: overall * 2,
                services_timeout: overall * 2,
            },
        }
    }
}

#[derive(Debug)]
pub struct ScanResult {
    pub device: DeviceId,
    pub attributes: AttributeMap,
    pub landmines: LandmineMap,
    pub permissions: PermissionMap,
}

/// Components needed to route an auto-pair through the Pairing Agent subsystem during
/// [`scan_and_connect_with_pairing_agent`] rather than calling `Device1.Pair` directly.
pub struct PairingAgentConfig {
    pub io: Arc<dyn AgentIoHandler>,
    pub states: Arc<PairingStateMachine>,
    pub bonds: Arc<BondStore>,
}

/// Discover, connect to, and GATT-walk the device at `address`, following `mode`'s timeout and
/// retry envelope. This is the crate's main entry point.
pub async fn scan_and_connect(
    facade: &dyn BluetoothFacade,
    address: &MacAddress,
    mode: ScanMode,
    transport: Transport,
    config: &CoreConfig,
    taxonomy: &TaxonomyConfig,
    overall_timeout: Duration,
) -> Result<ScanResult, CoreError> {
    scan_and_connect_with_pairing_agent(
        facade,
        address,
        mode,
        transport,
        config,
        taxonomy,
        overall_timeout,
        None,
    )
    .await
}

/// Same as [`scan_and_connect`], but when `pairing_agent` is given, an auto-pair triggered by a
/// `NotAuthorized` connect failure is routed through the Pairing Agent subsystem (asking the
/// agent's I/O policy before pairing, and persisting a successful pairing to its bond store)
/// instead of calling `Device1.Pair` directly.
pub async fn scan_and_connect_with_pairing_agent(
    facade: &dyn BluetoothFacade,
    address: &MacAddress,
    mode: ScanMode,
    transport: Transport,
    config: &CoreConfig,
    taxonomy: &TaxonomyConfig,
    overall_timeout: Duration,
    pairing_agent: Option<PairingAgentConfig>,
) -> Result<ScanResult, CoreError> {
    let envelope = mode.envelope(overall_timeout);
    let device = find_device(facade, address, transport, envelope.discovery_timeout).await?;

    let lifecycle = match pairing_agent {
        Some(agent) => DeviceLifecycle::with_pairing_agent(agent.io, agent.states, agent.bonds),
        None => DeviceLifecycle::new(),
    };
    let connect_budget = match mode {
        ScanMode::Naggy => envelope.connect_timeout,
        _ => envelope.connect_timeout,
    };
    lifecycle
        .connect_and_resolve(facade, &device, taxonomy, connect_budget)
        .await?;

    let report = walker::walk(
        facade,
        &device,
        taxonomy,
        config.read_retry_attempts,
        Duration::from_millis(config.read_retry_delay_ms),
    )
    .await?;

    let (mut permissions, mut landmines) = classify_walk_errors(&report.errors);
    let mut attributes = report.attributes;

    if mode == ScanMode::Bruteforce {
        bruteforce_probe(facade, &device, &mut attributes, config).await?;
    }

    Ok(ScanResult {
        device,
        attributes,
        landmines,
        permissions,
    })
}

async fn find_device(
    facade: &dyn BluetoothFacade,
    address: &MacAddress,
    transport: Transport,
    discovery_timeout: Duration,
) -> Result<DeviceId, CoreError> {
    let filter = bluez_async::DiscoveryFilter {
        transport: Some(transport),
        ..Default::default()
    };
    facade.start_discovery(&filter).await?;

    let deadline = tokio::time::Instant::now() + discovery_timeout;
    loop {
        let devices = facade.get_devices().await?;
        if let Some(found) = devices.into_iter().find(|d| &d.mac_address == address) {
            let _ = facade.stop_discovery().await;
            return Ok(found.id);
        }
        if tokio::time::Instant::now() >= deadline {
            let _ = facade.stop_discovery().await;
            return Err(CoreError::DeviceNotFound(address.to_string()));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Try reading a characteristic at every handle in `config.bruteforce_handle_ceiling`'s range
/// under each already-discovered service that the walk didn't already cover, recording anything
/// that answers as a synthetic attribute keyed by a deterministic UUID derived from the handle.
pub async fn bruteforce_probe(
    facade: &dyn BluetoothFacade,
    device: &DeviceId,
    attributes: &mut AttributeMap,
    config: &CoreConfig,
) -> Result<(), CoreError> {
    let services = facade.get_services(device).await?;
    let known_handles: std::collections::HashSet<u16> = attributes
        .services
        .values()
        .flat_map(|service| service.characteristics.values())
        .filter_map(|characteristic| characteristic.handle)
        .collect();

    for service in &services {
        let service_path: dbus::Path<'static> = service.id.clone().into();
        let service_path = service_path.to_string();
        for handle in 1..=config.bruteforce_handle_ceiling {
            if known_handles.contains(&handle) {
                continue;
            }
            let candidate_path = format!("{}/char{:04x}", service_path, handle);
            let candidate = CharacteristicId::new(&candidate_path);
            if let Ok(value) = facade.read_characteristic_value(&candidate).await {
                let uuid = synthetic_uuid(handle);
                let attr = CharacteristicAttribute {
                    handle: Some(handle),
                    flags: vec!["read".to_string()],
                    value: Some(hex_encode(&value)),
                    raw: Some(value),
                    descriptors: Default::default(),
                };
                if let Some(service_attr) = attributes.services.get_mut(&service.uuid) {
                    service_attr.characteristics.insert(uuid, attr);
                }
            }
        }
    }
    Ok(())
}

fn synthetic_uuid(handle: u16) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("unknown-{:04x}", handle).as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passive_envelope_splits_budget() {
        let envelope = ScanMode::Passive.envelope(Duration::from_secs(4));
        assert_eq!(envelope.discovery_timeout, Duration::from_secs(2));
        assert_eq!(envelope.connect_timeout, Duration::from_secs(1));
        assert_eq!(envelope.services_timeout, Duration::from_secs(1));
    }

    #[test]
    fn synthetic_uuid_is_deterministic() {
        assert_eq!(synthetic_uuid(7), synthetic_uuid(7));
        assert_ne!(synthetic_uuid(7), synthetic_uuid(8));
    }
}

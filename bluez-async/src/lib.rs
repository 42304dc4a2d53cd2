//! An async wrapper around the D-Bus interface of BlueZ (the Linux Bluetooth daemon), providing
//! a typed, testable surface for the Generic Attribute Profile (GATT) of Bluetooth Low Energy
//! plus the adapter/device lifecycle operations a reconnaissance client needs.
//!
//! Start by creating a [`BluetoothSession`].

mod adapter;
mod bleuuid;
mod characteristic;
mod descriptor;
mod device;
mod events;
pub mod facade;
pub mod health;
mod introspect;
mod messagestream;
pub mod pool;
mod service;
pub mod timeout;

pub use self::adapter::AdapterId;
pub use self::bleuuid::{uuid_from_u16, uuid_from_u32, BleUuid};
pub use self::characteristic::{CharacteristicFlags, CharacteristicId, CharacteristicInfo};
pub use self::descriptor::{DescriptorId, DescriptorInfo};
pub use self::device::{DeviceId, DeviceInfo};
pub use self::events::{AdapterEvent, BluetoothEvent, CharacteristicEvent, DeviceEvent};
pub use self::health::HealthEvent;
use self::introspect::IntrospectParse;
use self::messagestream::MessageStream;
pub use self::service::{ServiceId, ServiceInfo};
use bluez_generated::{
    OrgBluezAdapter1, OrgBluezAgentManager1, OrgBluezDevice1, OrgBluezDevice1Properties,
    OrgBluezGattCharacteristic1, OrgBluezGattDescriptor1, OrgBluezGattService1,
    ORG_BLUEZ_DEVICE1_NAME,
};
use dbus::arg::{PropMap, Variant};
use dbus::nonblock::stdintf::org_freedesktop_dbus::{Introspectable, ObjectManager, Properties};
use dbus::nonblock::{Proxy, SyncConnection};
use dbus::Path;
use dbus_tokio::connection::IOResourceError;
use futures::stream::{self, select_all, StreamExt};
use futures::{FutureExt, Stream};
use std::collections::HashMap;
use std::convert::TryInto;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use uuid::Uuid;

use crate::pool::{ConnectionPool, PoolConfig};
use crate::timeout::{with_timeout, TimeoutCategory, TimeoutTable};

const DBUS_METHOD_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const ORG_BLUEZ_AGENT_MANAGER_PATH: &str = "/org/bluez";

/// An error carrying out a Bluetooth operation.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No Bluetooth adapters were found on the system.
    #[error("No Bluetooth adapters found.")]
    NoBluetoothAdapters,
    /// There was an error talking to the BlueZ daemon over D-Bus.
    #[error(transparent)]
    DbusError(#[from] dbus::Error),
    /// Error parsing XML for introspection.
    #[error("Error parsing XML for introspection: {0}")]
    XmlParseError(#[from] serde_xml_rs::Error),
    /// No service or characteristic was found for some UUID.
    #[error("Service or characteristic UUID {uuid} not found.")]
    UUIDNotFound { uuid: Uuid },
    /// Error parsing a UUID from a string.
    #[error("Error parsing UUID string: {0}")]
    UUIDParseError(#[from] uuid::Error),
    /// Error parsing a characteristic flag from a string.
    #[error("Invalid characteristic flag {0:?}")]
    FlagParseError(String),
    /// A required property of some device or other object was not found.
    #[error("Required property {0} missing.")]
    RequiredPropertyMissing(&'static str),
    /// A bounded-wait operation did not complete before its deadline.
    #[error("{category} operation timed out")]
    Timeout { category: String },
}

/// Error type for futures representing tasks spawned by this crate.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("D-Bus connection lost: {0}")]
    DbusConnectionLost(#[source] IOResourceError),
    #[error("Task failed: {0}")]
    Join(#[from] JoinError),
}

/// MAC address of a Bluetooth device.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct MacAddress(String);

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An error parsing a MAC address from a string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid MAC address")]
pub struct ParseMacAddressError();

impl FromStr for MacAddress {
    type Err = ParseMacAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<_> = s.split(':').collect();
        if octets.len() != 6 {
            return Err(ParseMacAddressError());
        }
        for octet in octets {
            if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ParseMacAddressError());
            }
        }
        Ok(MacAddress(s.to_uppercase()))
    }
}

/// The type of transport to use for a scan or connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transport {
    /// Interleaved scan, both BLE and Bluetooth Classic (if both are enabled on the adapter).
    Auto,
    /// BR/EDR inquiry, i.e. Bluetooth Classic.
    BrEdr,
    /// LE scan only.
    Le,
}

impl Transport {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::BrEdr => "bredr",
            Self::Le => "le",
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of filter parameters for discovery. Parameters may be left `None` to use the BlueZ
/// defaults.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveryFilter {
    pub service_uuids: Vec<Uuid>,
    pub rssi_threshold: Option<i16>,
    pub pathloss_threshold: Option<u16>,
    pub transport: Option<Transport>,
    pub duplicate_data: Option<bool>,
    pub discoverable: Option<bool>,
    pub pattern: Option<String>,
}

impl From<&DiscoveryFilter> for PropMap {
    fn from(filter: &DiscoveryFilter) -> Self {
        let mut map: PropMap = HashMap::new();
        if !filter.service_uuids.is_empty() {
            let uuids: Vec<String> = filter.service_uuids.iter().map(Uuid::to_string).collect();
            map.insert("UUIDs".to_string(), Variant(Box::new(uuids)));
        }
        if let Some(rssi_threshold) = filter.rssi_threshold {
            map.insert("RSSI".to_string(), Variant(Box::new(rssi_threshold)));
        }
        if let Some(pathloss_threshold) = filter.pathloss_threshold {
            map.insert(
                "Pathloss".to_string(),
                Variant(Box::new(pathloss_threshold)),
            );
        }
        if let Some(transport) = filter.transport {
            map.insert(
                "Transport".to_string(),
                Variant(Box::new(transport.to_string())),
            );
        }
        if let Some(duplicate_data) = filter.duplicate_data {
            map.insert(
                "DuplicateData".to_string(),
                Variant(Box::new(duplicate_data)),
            );
        }
        if let Some(discoverable) = filter.discoverable {
            map.insert("Discoverable".to_string(), Variant(Box::new(discoverable)));
        }
        if let Some(pattern) = &filter.pattern {
            map.insert("Pattern".to_string(), Variant(Box::new(pattern.to_owned())));
        }
        map
    }
}

/// Parse the 4-hex-digit suffix of an object path whose last component starts with `prefix`,
/// e.g. `handle_suffix("/org/bluez/hci0/.../service0022", "service") == Some(0x0022)`.
pub(crate) fn handle_suffix(path: &Path<'_>, prefix: &str) -> Option<u16> {
    let last = path.to_string();
    let last = last.rsplit('/').next()?.to_owned();
    let digits = last.strip_prefix(prefix)?;
    u16::from_str_radix(digits, 16).ok()
}

/// A connection to the Bluetooth daemon. This can be cheaply cloned and passed around to be used
/// from different places. It is the main entry point to this library.
#[derive(Clone)]
pub struct BluetoothSession {
    connection: Arc<SyncConnection>,
    pool: Arc<ConnectionPool>,
    timeouts: Arc<TimeoutTable>,
}

impl Debug for BluetoothSession {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "BluetoothSession")
    }
}

impl BluetoothSession {
    /// Establish a new D-Bus connection to communicate with BlueZ.
    ///
    /// Returns a tuple of (join handle, Self). If the join handle ever completes then the D-Bus
    /// connection has been lost and the process should treat this as fatal (or trigger daemon
    /// recovery, if driving one).
    pub async fn new(
    ) -> Result<(impl Future<Output = Result<(), SpawnError>>, Self), BluetoothError> {
        Self::with_pool_config(PoolConfig::default()).await
    }

    pub async fn with_pool_config(
        pool_config: PoolConfig,
    ) -> Result<(impl Future<Output = Result<(), SpawnError>>, Self), BluetoothError> {
        let (dbus_resource, connection) = dbus_tokio::connection::new_system_sync()?;
        let dbus_handle = tokio::spawn(async {
            let err = dbus_resource.await;
            Err(SpawnError::DbusConnectionLost(err))
        });
        let pool = Arc::new(ConnectionPool::new(connection.clone(), pool_config));
        Ok((
            dbus_handle.map(|res| Ok(res??)),
            BluetoothSession {
                connection,
                pool,
                timeouts: Arc::new(TimeoutTable::default()),
            },
        ))
    }

    /// Access the per-device serialization lock used by higher layers (Device Lifecycle,
    /// Recovery Manager) to guarantee only one operation against a given device runs at a time.
    pub fn path_lock(&self, path: &Path<'_>) -> Arc<tokio::sync::Mutex<()>> {
        self.pool.lock_for_path(path)
    }

    pub fn connection(&self) -> Arc<SyncConnection> {
        self.connection.clone()
    }

    pub fn timeouts(&self) -> Arc<TimeoutTable> {
        self.timeouts.clone()
    }

    /// Power on all Bluetooth adapters, set the given discovery filter, and then start scanning
    /// for devices.
    pub async fn start_discovery(&self) -> Result<(), BluetoothError> {
        self.start_discovery_with_filter(&DiscoveryFilter::default())
            .await
    }

    pub async fn start_discovery_with_filter(
        &self,
        discovery_filter: &DiscoveryFilter,
    ) -> Result<(), BluetoothError> {
        let adapters = self.get_adapters().await?;
        if adapters.is_empty() {
            return Err(BluetoothError::NoBluetoothAdapters);
        }

        for adapter_id in adapters {
            log::trace!("Starting discovery on adapter {}", adapter_id);
            let adapter = self.adapter(&adapter_id);
            with_timeout(&self.timeouts, TimeoutCategory::SetProperty, async {
                Ok(adapter.set_powered(true).await?)
            })
            .await?;
            with_timeout(&self.timeouts, TimeoutCategory::SetProperty, async {
                Ok(adapter
                    .set_discovery_filter(discovery_filter.into())
                    .await?)
            })
            .await?;
            if let Err(err) = adapter.start_discovery().await {
                log::warn!("Starting discovery on {} failed: {:?}", adapter_id, err);
            }
        }
        Ok(())
    }

    /// Stop scanning for devices on all Bluetooth adapters.
    pub async fn stop_discovery(&self) -> Result<(), BluetoothError> {
        let adapters = self.get_adapters().await?;
        if adapters.is_empty() {
            return Err(BluetoothError::NoBluetoothAdapters);
        }
        for adapter_id in adapters {
            self.adapter(&adapter_id).stop_discovery().await?;
        }
        Ok(())
    }

    /// Get a list of all Bluetooth adapters on the system.
    pub async fn get_adapters(&self) -> Result<Vec<AdapterId>, BluetoothError> {
        let bluez_root = Proxy::new(
            "org.bluez",
            "/org/bluez",
            DBUS_METHOD_CALL_TIMEOUT,
            self.connection.clone(),
        );
        let root_node = bluez_root.introspect_parse().await?;
        Ok(root_node
            .nodes
            .iter()
            .filter_map(|subnode| {
                let subnode_name = subnode.name.as_ref()?;
                if subnode_name.starts_with("hci") {
                    Some(AdapterId::new(&format!("/org/bluez/{}", subnode_name)))
                } else {
                    None
                }
            })
            .collect())
    }

    /// Get a list of all Bluetooth devices which have been discovered so far.
    pub async fn get_devices(&self) -> Result<Vec<DeviceInfo>, BluetoothError> {
        let bluez_root = Proxy::new(
            "org.bluez",
            "/",
            DBUS_METHOD_CALL_TIMEOUT,
            self.connection.clone(),
        );
        let tree = bluez_root.get_managed_objects().await?;
        let devices = tree
            .into_iter()
            .filter_map(|(object_path, interfaces)| {
                let device_properties = OrgBluezDevice1Properties::from_interfaces(&interfaces)?;
                DeviceInfo::from_properties(DeviceId { object_path }, device_properties).ok()
            })
            .collect();
        Ok(devices)
    }

    /// Get a list of all GATT services which the given Bluetooth device offers.
    pub async fn get_services(
        &self,
        device: &DeviceId,
    ) -> Result<Vec<ServiceInfo>, BluetoothError> {
        let device_node = self.device(device).introspect_parse().await?;
        let mut services = vec![];
        for subnode in device_node.nodes {
            let subnode_name = subnode.name.as_ref().unwrap();
            if subnode_name.starts_with("service") {
                let service_id =
                    ServiceId::new(&format!("{}/{}", device.object_path, subnode_name));
                services.push(self.get_service_info(&service_id).await?);
            }
        }
        services.sort_by(|a, b| a.id.object_path.cmp(&b.id.object_path));
        Ok(services)
    }

    /// Get a list of all characteristics on the given GATT service.
    pub async fn get_characteristics(
        &self,
        service: &ServiceId,
    ) -> Result<Vec<CharacteristicInfo>, BluetoothError> {
        let service_node = self.service(service).introspect_parse().await?;
        let mut characteristics = vec![];
        for subnode in service_node.nodes {
            let subnode_name = subnode.name.as_ref().unwrap();
            if subnode_name.starts_with("char") {
                let characteristic_id =
                    CharacteristicId::new(&format!("{}/{}", service.object_path, subnode_name));
                characteristics.push(self.get_characteristic_info(&characteristic_id).await?);
            }
        }
        characteristics.sort_by(|a, b| a.id.object_path.cmp(&b.id.object_path));
        Ok(characteristics)
    }

    /// Get a list of all descriptors on the given GATT characteristic.
    pub async fn get_descriptors(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<Vec<DescriptorInfo>, BluetoothError> {
        let characteristic_node = self
            .characteristic(characteristic)
            .introspect_parse()
            .await?;
        let mut descriptors = vec![];
        for subnode in characteristic_node.nodes {
            let subnode_name = subnode.name.as_ref().unwrap();
            if subnode_name.starts_with("desc") {
                let descriptor_id = DescriptorId::new(&format!(
                    "{}/{}",
                    characteristic.object_path, subnode_name
                ));
                descriptors.push(self.get_descriptor_info(&descriptor_id).await?);
            }
        }
        descriptors.sort_by(|a, b| a.id.object_path.cmp(&b.id.object_path));
        Ok(descriptors)
    }

    pub async fn get_service_by_uuid(
        &self,
        device: &DeviceId,
        uuid: Uuid,
    ) -> Result<ServiceInfo, BluetoothError> {
        let services = self.get_services(device).await?;
        services
            .into_iter()
            .find(|service_info| service_info.uuid == uuid)
            .ok_or(BluetoothError::UUIDNotFound { uuid })
    }

    pub async fn get_characteristic_by_uuid(
        &self,
        service: &ServiceId,
        uuid: Uuid,
    ) -> Result<CharacteristicInfo, BluetoothError> {
        let characteristics = self.get_characteristics(service).await?;
        characteristics
            .into_iter()
            .find(|characteristic_info| characteristic_info.uuid == uuid)
            .ok_or(BluetoothError::UUIDNotFound { uuid })
    }

    /// Get information about the given Bluetooth device.
    pub async fn get_device_info(&self, id: &DeviceId) -> Result<DeviceInfo, BluetoothError> {
        let device = self.device(id);
        let properties = device.get_all(ORG_BLUEZ_DEVICE1_NAME).await?;
        DeviceInfo::from_properties(id.to_owned(), OrgBluezDevice1Properties(&properties))
    }

    pub async fn get_service_info(&self, id: &ServiceId) -> Result<ServiceInfo, BluetoothError> {
        let service = self.service(id);
        let uuid = Uuid::parse_str(&service.get_uuid().await?)?;
        let primary = service.get_primary().await?;
        Ok(ServiceInfo {
            id: id.to_owned(),
            uuid,
            primary,
        })
    }

    pub async fn get_characteristic_info(
        &self,
        id: &CharacteristicId,
    ) -> Result<CharacteristicInfo, BluetoothError> {
        let characteristic = self.characteristic(id);
        let uuid = Uuid::parse_str(&characteristic.get_uuid().await?)?;
        let flags = characteristic.get_flags().await?;
        Ok(CharacteristicInfo {
            id: id.to_owned(),
            uuid,
            flags: flags.try_into()?,
            mtu: characteristic.get_mtu().await.ok(),
        })
    }

    pub async fn get_descriptor_info(
        &self,
        id: &DescriptorId,
    ) -> Result<DescriptorInfo, BluetoothError> {
        let uuid = Uuid::parse_str(&self.descriptor(id).get_uuid().await?)?;
        Ok(DescriptorInfo {
            id: id.to_owned(),
            uuid,
        })
    }

    fn adapter(&self, id: &AdapterId) -> Proxy<'_, Arc<SyncConnection>> {
        self.pool.proxy(id.object_path.clone())
    }

    fn device(&self, id: &DeviceId) -> Proxy<'_, Arc<SyncConnection>> {
        self.pool.proxy(id.object_path.clone())
    }

    fn service(&self, id: &ServiceId) -> Proxy<'_, Arc<SyncConnection>> {
        self.pool.proxy(id.object_path.clone())
    }

    fn characteristic(&self, id: &CharacteristicId) -> Proxy<'_, Arc<SyncConnection>> {
        self.pool.proxy(id.object_path.clone())
    }

    fn descriptor(&self, id: &DescriptorId) -> Proxy<'_, Arc<SyncConnection>> {
        self.pool.proxy(id.object_path.clone())
    }

    /// Connect to the given Bluetooth device, bounded by the connect timeout category.
    pub async fn connect(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        let device = self.device(id);
        with_timeout(&self.timeouts, TimeoutCategory::Connect, async {
            Ok(device.connect().await?)
        })
        .await
    }

    /// Disconnect from the given Bluetooth device.
    pub async fn disconnect(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        let device = self.device(id);
        with_timeout(&self.timeouts, TimeoutCategory::Disconnect, async {
            Ok(device.disconnect().await?)
        })
        .await
    }

    /// Initiate pairing with the given device.
    pub async fn pair(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        let device = self.device(id);
        with_timeout(&self.timeouts, TimeoutCategory::Pair, async {
            Ok(device.pair().await?)
        })
        .await
    }

    pub async fn set_trusted(&self, id: &DeviceId, trusted: bool) -> Result<(), BluetoothError> {
        Ok(self.device(id).set_trusted(trusted).await?)
    }

    /// Register an agent handler path for pairing callbacks with the given I/O capability.
    pub async fn register_agent(
        &self,
        agent_path: Path<'_>,
        capability: &str,
        default: bool,
    ) -> Result<(), BluetoothError> {
        let manager = Proxy::new(
            "org.bluez",
            ORG_BLUEZ_AGENT_MANAGER_PATH,
            DBUS_METHOD_CALL_TIMEOUT,
            self.connection.clone(),
        );
        manager
            .register_agent(agent_path.clone(), capability)
            .await?;
        if default {
            manager.request_default_agent(agent_path).await?;
        }
        Ok(())
    }

    pub async fn unregister_agent(&self, agent_path: Path<'_>) -> Result<(), BluetoothError> {
        let manager = Proxy::new(
            "org.bluez",
            ORG_BLUEZ_AGENT_MANAGER_PATH,
            DBUS_METHOD_CALL_TIMEOUT,
            self.connection.clone(),
        );
        Ok(manager.unregister_agent(agent_path).await?)
    }

    /// Read the value of the given GATT characteristic, with the given read options (e.g.
    /// `{"offset": u16}`).
    pub async fn read_characteristic_value_with_options(
        &self,
        id: &CharacteristicId,
        options: PropMap,
    ) -> Result<Vec<u8>, BluetoothError> {
        let characteristic = self.characteristic(id);
        with_timeout(&self.timeouts, TimeoutCategory::Read, async {
            Ok(characteristic.read_value(options).await?)
        })
        .await
    }

    pub async fn read_characteristic_value(
        &self,
        id: &CharacteristicId,
    ) -> Result<Vec<u8>, BluetoothError> {
        self.read_characteristic_value_with_options(id, HashMap::new())
            .await
    }

    pub async fn write_characteristic_value(
        &self,
        id: &CharacteristicId,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), BluetoothError> {
        let characteristic = self.characteristic(id);
        let value = value.into();
        with_timeout(&self.timeouts, TimeoutCategory::Write, async {
            Ok(characteristic.write_value(value, HashMap::new()).await?)
        })
        .await
    }

    pub async fn read_descriptor_value_with_options(
        &self,
        id: &DescriptorId,
        options: PropMap,
    ) -> Result<Vec<u8>, BluetoothError> {
        let descriptor = self.descriptor(id);
        with_timeout(&self.timeouts, TimeoutCategory::Read, async {
            Ok(descriptor.read_value(options).await?)
        })
        .await
    }

    pub async fn read_descriptor_value(&self, id: &DescriptorId) -> Result<Vec<u8>, BluetoothError> {
        self.read_descriptor_value_with_options(id, HashMap::new())
            .await
    }

    /// Fetch the `Value` property directly, used as the last resort of the descriptor read
    /// fallback when `ReadValue` itself is unavailable.
    pub async fn get_descriptor_value_property(
        &self,
        id: &DescriptorId,
    ) -> Result<Vec<u8>, BluetoothError> {
        let descriptor = self.descriptor(id);
        Ok(descriptor.get_value().await?)
    }

    pub async fn write_descriptor_value(
        &self,
        id: &DescriptorId,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), BluetoothError> {
        let descriptor = self.descriptor(id);
        let value = value.into();
        with_timeout(&self.timeouts, TimeoutCategory::Write, async {
            Ok(descriptor.write_value(value, HashMap::new()).await?)
        })
        .await
    }

    pub async fn start_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError> {
        let characteristic = self.characteristic(id);
        with_timeout(&self.timeouts, TimeoutCategory::StartNotify, async {
            Ok(characteristic.start_notify().await?)
        })
        .await
    }

    pub async fn stop_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError> {
        let characteristic = self.characteristic(id);
        with_timeout(&self.timeouts, TimeoutCategory::StopNotify, async {
            Ok(characteristic.stop_notify().await?)
        })
        .await
    }

    /// Get a stream of events for all devices.
    pub async fn event_stream(&self) -> Result<impl Stream<Item = BluetoothEvent>, BluetoothError> {
        self.filtered_event_stream(None::<&DeviceId>).await
    }

    /// Get a stream of events for a particular device, including its characteristics.
    pub async fn device_event_stream(
        &self,
        device: &DeviceId,
    ) -> Result<impl Stream<Item = BluetoothEvent>, BluetoothError> {
        self.filtered_event_stream(Some(device)).await
    }

    pub async fn characteristic_event_stream(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<impl Stream<Item = BluetoothEvent>, BluetoothError> {
        self.filtered_event_stream(Some(characteristic)).await
    }

    async fn filtered_event_stream(
        &self,
        object: Option<&(impl Into<Path<'static>> + Clone)>,
    ) -> Result<impl Stream<Item = BluetoothEvent>, BluetoothError> {
        let mut message_streams = vec![];
        for match_rule in BluetoothEvent::match_rules(object.cloned()) {
            let msg_match = self.connection.add_match(match_rule).await?;
            message_streams.push(MessageStream::new(msg_match, self.connection.clone()));
        }
        Ok(select_all(message_streams)
            .flat_map(|message| stream::iter(BluetoothEvent::message_to_events(message))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_parses() {
        let mac: MacAddress = "aa:bb:CC:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn mac_address_rejects_garbage() {
        assert!("not-a-mac".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<MacAddress>().is_err());
    }

    #[test]
    fn handle_suffix_parses() {
        let path: Path = "/org/bluez/hci0/dev_11_22_33_44_55_66/service0022".into();
        assert_eq!(handle_suffix(&path, "service"), Some(0x0022));
    }
}

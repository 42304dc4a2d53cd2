use dbus::arg::{RefArg, Variant};
use dbus::Path;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

use crate::{AdapterId, BluetoothError, MacAddress};
use bluez_generated::OrgBluezDevice1Properties;

/// Opaque identifier for a Bluetooth device known to BlueZ, on a particular adapter.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceId {
    pub(crate) object_path: Path<'static>,
}

impl DeviceId {
    /// Construct a device ID from a raw D-Bus object path, e.g.
    /// `/org/bluez/hci0/dev_11_22_33_44_55_66`.
    pub fn new(object_path: &str) -> Self {
        Self {
            object_path: object_path.to_owned().into(),
        }
    }

    /// Get the ID of the adapter on which this device was discovered.
    pub fn adapter(&self) -> AdapterId {
        let index = self
            .object_path
            .rfind('/')
            .expect("DeviceId object_path must contain a slash.");
        AdapterId::new(&self.object_path[0..index])
    }
}

impl From<DeviceId> for Path<'static> {
    fn from(id: DeviceId) -> Self {
        id.object_path
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.object_path
                .to_string()
                .strip_prefix("/org/bluez/")
                .ok_or(fmt::Error)?
        )
    }
}

/// Information about a Bluetooth device known to BlueZ.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    /// An opaque identifier for the device, including the adapter it was discovered on.
    pub id: DeviceId,
    /// The MAC address of the device.
    pub mac_address: MacAddress,
    /// The Bluetooth class of the device, if known.
    pub class: Option<u32>,
    /// The appearance of the device, if known.
    pub appearance: Option<u16>,
    /// Local name, such as a user-friendly name, presented over general discovery.
    pub name: Option<String>,
    /// Proposed short friendly name for the device, possibly including both the name and address.
    pub alias: String,
    /// Whether the device is currently paired with the adapter.
    pub paired: bool,
    /// Whether the device is currently trusted, allowing it to connect without re-pairing.
    pub trusted: bool,
    /// Whether the device is currently connected.
    pub connected: bool,
    /// The received signal strength indicator, in dBm, of the last advertisement or inquiry
    /// response received from the device, if known.
    pub rssi: Option<i16>,
    /// The transmit power the device reports it is broadcasting at, if known.
    pub tx_power: Option<i16>,
    /// Manufacturer-specific advertisement data, keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Service advertisement data, keyed by service UUID.
    pub service_data: HashMap<Uuid, Vec<u8>>,
    /// The set of GATT service UUIDs advertised by, or discovered on, the device.
    pub services: Vec<Uuid>,
    /// Whether service discovery has completed for this device.
    pub services_resolved: bool,
}

impl DeviceInfo {
    pub(crate) fn from_properties(
        id: DeviceId,
        device_properties: OrgBluezDevice1Properties,
    ) -> Result<Self, BluetoothError> {
        let mac_address = MacAddress::from_str(
            device_properties
                .address()
                .ok_or(BluetoothError::RequiredPropertyMissing("Address"))?,
        )
        .map_err(|_| BluetoothError::RequiredPropertyMissing("Address"))?;
        Ok(Self {
            id,
            mac_address,
            class: device_properties.class(),
            appearance: device_properties.appearance(),
            name: device_properties.name().map(ToOwned::to_owned),
            alias: device_properties
                .alias()
                .map(ToOwned::to_owned)
                .unwrap_or_default(),
            paired: device_properties.paired().unwrap_or(false),
            trusted: device_properties.trusted().unwrap_or(false),
            connected: device_properties.connected().unwrap_or(false),
            rssi: device_properties.rssi(),
            tx_power: device_properties.tx_power(),
            manufacturer_data: device_properties
                .manufacturer_data()
                .map(convert_manufacturer_data)
                .unwrap_or_default(),
            service_data: device_properties
                .service_data()
                .map(convert_service_data)
                .unwrap_or_default(),
            services: device_properties
                .uuids()
                .map(convert_services)
                .unwrap_or_default(),
            services_resolved: device_properties.services_resolved().unwrap_or(false),
        })
    }
}

pub(crate) fn convert_manufacturer_data(
    data: HashMap<u16, Variant<Box<dyn RefArg>>>,
) -> HashMap<u16, Vec<u8>> {
    data.into_iter()
        .filter_map(|(id, variant)| dbus::arg::cast::<Vec<u8>>(&variant.0).map(|v| (id, v.to_owned())))
        .collect()
}

pub(crate) fn convert_service_data(
    data: HashMap<String, Variant<Box<dyn RefArg>>>,
) -> HashMap<Uuid, Vec<u8>> {
    data.into_iter()
        .filter_map(|(uuid, variant)| {
            let uuid = Uuid::parse_str(&uuid).ok()?;
            let bytes = dbus::arg::cast::<Vec<u8>>(&variant.0)?.to_owned();
            Some((uuid, bytes))
        })
        .collect()
}

pub(crate) fn convert_services(uuids: Vec<String>) -> Vec<Uuid> {
    uuids
        .into_iter()
        .filter_map(|uuid| Uuid::parse_str(&uuid).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_adapter() {
        let adapter_id = AdapterId::new("/org/bluez/hci0");
        let device_id = DeviceId::new("/org/bluez/hci0/dev_11_22_33_44_55_66");
        assert_eq!(device_id.adapter(), adapter_id);
    }
}

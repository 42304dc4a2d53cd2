//! An in-memory [`BluetoothFacade`] for exercising the Device Lifecycle, GATT Walker, and
//! Classification Engine without a live `bluetoothd`. Only available behind the `testing`
//! feature; canned responses are supplied up front and consumed in order, so a test can script
//! "fails twice, then succeeds" or "always times out" per characteristic/descriptor.

use async_trait::async_trait;
use bluez_async::facade::BluetoothFacade;
use bluez_async::{
    BluetoothError, CharacteristicFlags, CharacteristicId, CharacteristicInfo, DescriptorId,
    DescriptorInfo, DeviceId, DeviceInfo, DiscoveryFilter, MacAddress, ServiceId, ServiceInfo,
};
use dbus::arg::PropMap;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// A scripted sequence of responses a mock attribute returns, consumed one per call; the last
/// entry repeats once exhausted.
#[derive(Clone)]
pub struct ScriptedReads(Vec<Result<Vec<u8>, BluetoothError>>);

impl ScriptedReads {
    pub fn always_ok(value: Vec<u8>) -> Self {
        Self(vec![Ok(value)])
    }

    pub fn sequence(responses: Vec<Result<Vec<u8>, BluetoothError>>) -> Self {
        Self(responses)
    }

    fn next(&self, call_index: usize) -> Result<Vec<u8>, BluetoothError> {
        let index = call_index.min(self.0.len().saturating_sub(1));
        match &self.0[index] {
            Ok(value) => Ok(value.clone()),
            Err(err) => Err(clone_error(err)),
        }
    }
}

fn clone_error(err: &BluetoothError) -> BluetoothError {
    match err {
        BluetoothError::DbusError(inner) => {
            BluetoothError::DbusError(dbus::Error::new_custom(
                inner.name().unwrap_or("org.bluez.Error.Failed"),
                inner.message().unwrap_or(""),
            ))
        }
        BluetoothError::Timeout { category } => BluetoothError::Timeout {
            category: category.clone(),
        },
        other => BluetoothError::Timeout {
            category: format!("{:?}", other),
        },
    }
}

pub struct MockDescriptor {
    pub uuid: Uuid,
    pub reads: ScriptedReads,
}

pub struct MockCharacteristic {
    pub uuid: Uuid,
    pub flags: CharacteristicFlags,
    pub reads: ScriptedReads,
    pub descriptors: Vec<MockDescriptor>,
}

pub struct MockService {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<MockCharacteristic>,
    /// Handle-to-value responses for handles BlueZ's object tree never advertised as a
    /// characteristic, answered only by [`BluetoothFacade::read_characteristic_value`] the way a
    /// bruteforce probe would see them. Keyed by the same small decimal index
    /// [`index_after`] parses out of the candidate object path, so only handles below 10 are
    /// usable here.
    pub undeclared: HashMap<u16, Vec<u8>>,
}

pub struct MockDevice {
    pub mac_address: MacAddress,
    pub services: Vec<MockService>,
}

/// In-memory [`BluetoothFacade`] backed by a fixed set of [`MockDevice`]s, discoverable
/// immediately (no real scan delay) and always connectable.
pub struct MockFacade {
    devices: Vec<MockDevice>,
    call_counts: Mutex<HashMap<String, usize>>,
}

impl MockFacade {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            call_counts: Mutex::new(HashMap::new()),
        }
    }

    fn device_id(&self, device: &MockDevice) -> DeviceId {
        let suffix = device.mac_address.to_string().replace(':', "_");
        DeviceId::new(&format!("/org/bluez/hci0/dev_{}", suffix))
    }

    fn find_device(&self, id: &DeviceId) -> Option<&MockDevice> {
        self.devices.iter().find(|d| &self.device_id(d) == id)
    }

    fn next_call_index(&self, key: &str) -> usize {
        let mut counts = self.call_counts.lock().unwrap();
        let entry = counts.entry(key.to_string()).or_insert(0);
        let index = *entry;
        *entry += 1;
        index
    }
}

#[async_trait]
impl BluetoothFacade for MockFacade {
    async fn list_adapters(&self) -> Result<Vec<bluez_async::AdapterId>, BluetoothError> {
        Ok(vec![bluez_async::AdapterId::new("/org/bluez/hci0")])
    }

    async fn start_discovery(&self, _filter: &DiscoveryFilter) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, BluetoothError> {
        Ok(self
            .devices
            .iter()
            .map(|device| DeviceInfo {
                id: self.device_id(device),
                mac_address: device.mac_address.clone(),
                class: None,
                appearance: None,
                name: None,
                alias: String::new(),
                paired: true,
                trusted: true,
                connected: true,
                rssi: Some(-50),
                tx_power: None,
                manufacturer_data: HashMap::new(),
                service_data: HashMap::new(),
                services: device.services.iter().map(|s| s.uuid).collect(),
                services_resolved: true,
            })
            .collect())
    }

    async fn get_device_info(&self, id: &DeviceId) -> Result<DeviceInfo, BluetoothError> {
        self.get_devices()
            .await?
            .into_iter()
            .find(|d| &d.id == id)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })
    }

    async fn get_services(&self, device: &DeviceId) -> Result<Vec<ServiceInfo>, BluetoothError> {
        let mock = self
            .find_device(device)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        Ok(mock
            .services
            .iter()
            .enumerate()
            .map(|(index, service)| ServiceInfo {
                id: ServiceId::new(&format!(
                    "{}/service{:04}",
                    Into::<dbus::Path<'static>>::into(device.clone()),
                    index
                )),
                uuid: service.uuid,
                primary: service.primary,
            })
            .collect())
    }

    async fn get_characteristics(
        &self,
        service: &ServiceId,
    ) -> Result<Vec<CharacteristicInfo>, BluetoothError> {
        let device = service.device();
        let mock = self
            .find_device(&device)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let service_path: dbus::Path<'static> = service.clone().into();
        let service_index = index_after(&service_path.to_string(), "service").unwrap_or(0);
        let mock_service = mock
            .services
            .get(service_index)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        Ok(mock_service
            .characteristics
            .iter()
            .enumerate()
            .map(|(index, characteristic)| CharacteristicInfo {
                id: CharacteristicId::new(&format!("{}/char{:04}", service_path, index)),
                uuid: characteristic.uuid,
                flags: characteristic.flags,
                mtu: None,
            })
            .collect())
    }

    async fn get_descriptors(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<Vec<DescriptorInfo>, BluetoothError> {
        let service = characteristic.service();
        let device = service.device();
        let mock = self
            .find_device(&device)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let characteristic_path: dbus::Path<'static> = characteristic.clone().into();
        let path_string = characteristic_path.to_string();
        let mock_characteristic = index_after(&path_string, "service")
            .and_then(|service_index| mock.services.get(service_index))
            .and_then(|s| {
                index_after(&path_string, "char").and_then(|char_index| s.characteristics.get(char_index))
            })
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        Ok(mock_characteristic
            .descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| DescriptorInfo {
                id: DescriptorId::new(&format!("{}/desc{:04}", path_string, index)),
                uuid: descriptor.uuid,
            })
            .collect())
    }

    async fn connect(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn disconnect(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn pair(&self, _id: &DeviceId) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn set_trusted(&self, _id: &DeviceId, _trusted: bool) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn read_characteristic_value(
        &self,
        id: &CharacteristicId,
    ) -> Result<Vec<u8>, BluetoothError> {
        let service = id.service();
        let device = service.device();
        let mock = self
            .find_device(&device)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let path: dbus::Path<'static> = id.clone().into();
        let path_string = path.to_string();
        let mock_service = index_after(&path_string, "service")
            .and_then(|service_index| mock.services.get(service_index))
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let char_index = index_after(&path_string, "char");
        if let Some(characteristic) = char_index.and_then(|i| mock_service.characteristics.get(i)) {
            let call_index = self.next_call_index(&path_string);
            return characteristic.reads.next(call_index);
        }
        if let Some(value) = char_index
            .and_then(|i| u16::try_from(i).ok())
            .and_then(|handle| mock_service.undeclared.get(&handle))
        {
            return Ok(value.clone());
        }
        Err(BluetoothError::UUIDNotFound { uuid: Uuid::nil() })
    }

    async fn write_characteristic_value(
        &self,
        _id: &CharacteristicId,
        _value: Vec<u8>,
    ) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn read_descriptor_value_with_options(
        &self,
        id: &DescriptorId,
        _options: PropMap,
    ) -> Result<Vec<u8>, BluetoothError> {
        let characteristic = id.characteristic();
        let service = characteristic.service();
        let device = service.device();
        let mock = self
            .find_device(&device)
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let path: dbus::Path<'static> = id.clone().into();
        let path_string = path.to_string();
        let descriptor = index_after(&path_string, "service")
            .and_then(|service_index| mock.services.get(service_index))
            .and_then(|s| index_after(&path_string, "char").and_then(|i| s.characteristics.get(i)))
            .and_then(|c| index_after(&path_string, "desc").and_then(|i| c.descriptors.get(i)))
            .ok_or_else(|| BluetoothError::UUIDNotFound { uuid: Uuid::nil() })?;
        let call_index = self.next_call_index(&path_string);
        descriptor.reads.next(call_index)
    }

    async fn get_descriptor_value_property(
        &self,
        id: &DescriptorId,
    ) -> Result<Vec<u8>, BluetoothError> {
        self.read_descriptor_value_with_options(id, PropMap::new()).await
    }

    async fn write_descriptor_value(
        &self,
        _id: &DescriptorId,
        _value: Vec<u8>,
    ) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn start_notify(&self, _id: &CharacteristicId) -> Result<(), BluetoothError> {
        Ok(())
    }

    async fn stop_notify(&self, _id: &CharacteristicId) -> Result<(), BluetoothError> {
        Ok(())
    }
}

pub fn mac(address: &str) -> MacAddress {
    MacAddress::from_str(address).expect("valid test MAC address")
}

/// Find the last path segment starting with `marker` and parse the digits immediately following
/// it, e.g. `index_after(".../service0000/char0003", "char") == Some(3)`.
fn index_after(path: &str, marker: &str) -> Option<usize> {
    path.split('/')
        .rev()
        .find(|segment| segment.starts_with(marker))
        .and_then(|segment| segment[marker.len()..].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_after_parses_trailing_digits() {
        let path = "/org/bluez/hci0/dev_AA/service0000/char0003/desc0001";
        assert_eq!(index_after(path, "service"), Some(0));
        assert_eq!(index_after(path, "char"), Some(3));
        assert_eq!(index_after(path, "desc"), Some(1));
    }
}

//! The narrow, testable surface that everything above this crate is built against: the "Host
//! Bluetooth Facade" of the design. [`BlueZFacade`] is the real implementation, backed by a
//! [`BluetoothSession`]; test code elsewhere in the workspace provides a `MockFacade` behind a
//! `testing` feature so the GATT Walker and friends can run without a live `bluetoothd`.

use async_trait::async_trait;
use dbus::arg::PropMap;
use std::collections::HashMap;

use crate::{
    AdapterId, BluetoothError, CharacteristicId, CharacteristicInfo, DescriptorId, DescriptorInfo,
    DeviceId, DeviceInfo, DiscoveryFilter, ServiceId, ServiceInfo,
};

/// Abstraction over a host Bluetooth daemon, narrow enough to mock in tests.
#[async_trait]
pub trait BluetoothFacade: Send + Sync {
    async fn list_adapters(&self) -> Result<Vec<AdapterId>, BluetoothError>;
    async fn start_discovery(&self, filter: &DiscoveryFilter) -> Result<(), BluetoothError>;
    async fn stop_discovery(&self) -> Result<(), BluetoothError>;
    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, BluetoothError>;
    async fn get_device_info(&self, id: &DeviceId) -> Result<DeviceInfo, BluetoothError>;
    async fn get_services(&self, device: &DeviceId) -> Result<Vec<ServiceInfo>, BluetoothError>;
    async fn get_characteristics(
        &self,
        service: &ServiceId,
    ) -> Result<Vec<CharacteristicInfo>, BluetoothError>;
    async fn get_descriptors(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<Vec<DescriptorInfo>, BluetoothError>;
    async fn connect(&self, id: &DeviceId) -> Result<(), BluetoothError>;
    async fn disconnect(&self, id: &DeviceId) -> Result<(), BluetoothError>;
    async fn pair(&self, id: &DeviceId) -> Result<(), BluetoothError>;
    async fn set_trusted(&self, id: &DeviceId, trusted: bool) -> Result<(), BluetoothError>;
    async fn read_characteristic_value(
        &self,
        id: &CharacteristicId,
    ) -> Result<Vec<u8>, BluetoothError>;
    async fn write_characteristic_value(
        &self,
        id: &CharacteristicId,
        value: Vec<u8>,
    ) -> Result<(), BluetoothError>;
    async fn read_descriptor_value_with_options(
        &self,
        id: &DescriptorId,
        options: PropMap,
    ) -> Result<Vec<u8>, BluetoothError>;
    async fn get_descriptor_value_property(
        &self,
        id: &DescriptorId,
    ) -> Result<Vec<u8>, BluetoothError>;
    async fn write_descriptor_value(
        &self,
        id: &DescriptorId,
        value: Vec<u8>,
    ) -> Result<(), BluetoothError>;
    async fn start_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError>;
    async fn stop_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError>;
}

/// [`BluetoothFacade`] implementation backed by a real [`crate::BluetoothSession`] connected to
/// `bluetoothd` over the system bus.
pub struct BlueZFacade {
    session: crate::BluetoothSession,
}

impl BlueZFacade {
    pub fn new(session: crate::BluetoothSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl BluetoothFacade for BlueZFacade {
    async fn list_adapters(&self) -> Result<Vec<AdapterId>, BluetoothError> {
        self.session.get_adapters().await
    }

    async fn start_discovery(&self, filter: &DiscoveryFilter) -> Result<(), BluetoothError> {
        self.session.start_discovery_with_filter(filter).await
    }

    async fn stop_discovery(&self) -> Result<(), BluetoothError> {
        self.session.stop_discovery().await
    }

    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, BluetoothError> {
        self.session.get_devices().await
    }

    async fn get_device_info(&self, id: &DeviceId) -> Result<DeviceInfo, BluetoothError> {
        self.session.get_device_info(id).await
    }

    async fn get_services(&self, device: &DeviceId) -> Result<Vec<ServiceInfo>, BluetoothError> {
        self.session.get_services(device).await
    }

    async fn get_characteristics(
        &self,
        service: &ServiceId,
    ) -> Result<Vec<CharacteristicInfo>, BluetoothError> {
        self.session.get_characteristics(service).await
    }

    async fn get_descriptors(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<Vec<DescriptorInfo>, BluetoothError> {
        self.session.get_descriptors(characteristic).await
    }

    async fn connect(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        self.session.connect(id).await
    }

    async fn disconnect(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        self.session.disconnect(id).await
    }

    async fn pair(&self, id: &DeviceId) -> Result<(), BluetoothError> {
        self.session.pair(id).await
    }

    async fn set_trusted(&self, id: &DeviceId, trusted: bool) -> Result<(), BluetoothError> {
        self.session.set_trusted(id, trusted).await
    }

    async fn read_characteristic_value(
        &self,
        id: &CharacteristicId,
    ) -> Result<Vec<u8>, BluetoothError> {
        self.session.read_characteristic_value(id).await
    }

    async fn write_characteristic_value(
        &self,
        id: &CharacteristicId,
        value: Vec<u8>,
    ) -> Result<(), BluetoothError> {
        self.session.write_characteristic_value(id, value).await
    }

    async fn read_descriptor_value_with_options(
        &self,
        id: &DescriptorId,
        options: PropMap,
    ) -> Result<Vec<u8>, BluetoothError> {
        self.session
            .read_descriptor_value_with_options(id, options)
            .await
    }

    async fn get_descriptor_value_property(
        &self,
        id: &DescriptorId,
    ) -> Result<Vec<u8>, BluetoothError> {
        self.session.get_descriptor_value_property(id).await
    }

    async fn write_descriptor_value(
        &self,
        id: &DescriptorId,
        value: Vec<u8>,
    ) -> Result<(), BluetoothError> {
        self.session.write_descriptor_value(id, value).await
    }

    async fn start_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError> {
        self.session.start_notify(id).await
    }

    async fn stop_notify(&self, id: &CharacteristicId) -> Result<(), BluetoothError> {
        self.session.stop_notify(id).await
    }
}

/// Empty options map, for call sites that don't need an offset or other read/write option.
pub fn no_options() -> PropMap {
    HashMap::new()
}

/// Build a read-options map containing just an `offset`, as the descriptor read fallback's first
/// attempt uses.
pub fn offset_options(offset: u16) -> PropMap {
    let mut map = HashMap::new();
    map.insert(
        "offset".to_string(),
        dbus::arg::Variant(Box::new(offset) as Box<dyn dbus::arg::RefArg>),
    );
    map
}

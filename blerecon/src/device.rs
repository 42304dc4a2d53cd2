//! Programmatic handle onto one device: the connect/pair/resolve lifecycle, per-characteristic
//! read/write/notify, and the two error-taxonomy reports, all bundled behind a single type so a
//! caller scripting against this crate doesn't have to wire the Lifecycle, GATT Walker, and
//! Classification Engine together itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluez_async::facade::BluetoothFacade;
use bluez_async::{CharacteristicId, DeviceId};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gatt::map::{AttributeMap, LandmineMap, ObjectKind, PermissionMap};
use crate::gatt::{classify_walk_errors, walker};
use crate::lifecycle::DeviceLifecycle;
use crate::signals::{SignalHub, SignalSource};
use crate::taxonomy::TaxonomyConfig;

/// What's known about a characteristic's safety to poke at, derived from the last walk's
/// permission/landmine classification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CharacteristicSafety {
    /// Neither report has anything recorded against this UUID.
    Unknown,
    /// Readable/writable without any recorded restriction.
    Safe,
    /// Flagged in the permission report under `category` (e.g. `requires_authentication`).
    RequiresPermission { category: &'static str },
    /// Flagged in the landmine report under `category` (e.g. `no_reply`).
    Landmine { category: &'static str },
}

#[derive(Default)]
struct DeviceState {
    attributes: AttributeMap,
    permissions: PermissionMap,
    landmines: LandmineMap,
    characteristic_ids: HashMap<Uuid, CharacteristicId>,
    services_resolved: bool,
}

/// One device, tracked through connect/pair/resolve and everything read off its GATT tree since.
/// Borrows the facade rather than owning it, matching the rest of this crate's functions.
pub struct Device<'a> {
    facade: &'a dyn BluetoothFacade,
    id: DeviceId,
    taxonomy: TaxonomyConfig,
    config: CoreConfig,
    lifecycle: DeviceLifecycle,
    signals: Arc<SignalHub>,
    state: Mutex<DeviceState>,
}

impl<'a> Device<'a> {
    pub fn new(
        facade: &'a dyn BluetoothFacade,
        id: DeviceId,
        taxonomy: TaxonomyConfig,
        config: CoreConfig,
        signals: Arc<SignalHub>,
    ) -> Self {
        Self {
            facade,
            id,
            taxonomy,
            config,
            lifecycle: DeviceLifecycle::new(),
            signals,
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Connect, retrying and auto-pairing per [`DeviceLifecycle::connect_and_resolve`], then wait
    /// for BlueZ to resolve services.
    pub async fn connect(&self, max_elapsed: Duration) -> Result<(), CoreError> {
        self.lifecycle
            .connect_and_resolve(self.facade, &self.id, &self.taxonomy, max_elapsed)
            .await?;
        self.state.lock().unwrap().services_resolved = true;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), CoreError> {
        self.lifecycle.disconnect(self.facade, &self.id).await?;
        self.state.lock().unwrap().services_resolved = false;
        Ok(())
    }

    /// Pair directly, bypassing the auto-pair-on-`NotAuthorized` path `connect` takes. Useful for
    /// a caller that wants to pair before ever attempting a connection.
    pub async fn pair(&self) -> Result<(), CoreError> {
        self.facade.pair(&self.id).await.map_err(CoreError::Bluetooth)
    }

    pub async fn set_trusted(&self, trusted: bool) -> Result<(), CoreError> {
        self.facade
            .set_trusted(&self.id, trusted)
            .await
            .map_err(CoreError::Bluetooth)
    }

    pub async fn is_connected(&self) -> Result<bool, CoreError> {
        Ok(self.facade.get_device_info(&self.id).await?.connected)
    }

    pub async fn is_paired(&self) -> Result<bool, CoreError> {
        Ok(self.facade.get_device_info(&self.id).await?.paired)
    }

    pub async fn is_trusted(&self) -> Result<bool, CoreError> {
        Ok(self.facade.get_device_info(&self.id).await?.trusted)
    }

    /// Whether BlueZ has resolved this device's services. `deep: true` re-queries
    /// `Device1.ServicesResolved` directly; `deep: false` returns the value last observed by
    /// `connect`/`force_service_resolution`/a walk, with no D-Bus round trip.
    pub async fn services_resolved(&self, deep: bool) -> Result<bool, CoreError> {
        if !deep {
            return Ok(self.state.lock().unwrap().services_resolved);
        }
        let resolved = self.facade.get_device_info(&self.id).await?.services_resolved;
        self.state.lock().unwrap().services_resolved = resolved;
        Ok(resolved)
    }

    /// Force BlueZ to re-resolve services by disconnecting and reconnecting, then walk the GATT
    /// tree and refresh the cached attribute/permission/landmine state. BlueZ only re-runs service
    /// discovery on a fresh connection, so there's no lighter-weight way to force this.
    pub async fn force_service_resolution(&self, max_elapsed: Duration) -> Result<(), CoreError> {
        let _ = self.facade.disconnect(&self.id).await;
        self.connect(max_elapsed).await?;
        self.refresh_attributes().await
    }

    /// Re-walk the GATT tree, replacing the cached attribute map, permission report, landmine
    /// report, and characteristic-id lookup table.
    async fn refresh_attributes(&self) -> Result<(), CoreError> {
        let report = walker::walk(
            self.facade,
            &self.id,
            &self.taxonomy,
            self.config.read_retry_attempts,
            Duration::from_millis(self.config.read_retry_delay_ms),
        )
        .await?;
        let (permissions, landmines) = classify_walk_errors(&report.errors);

        let mut characteristics = self.facade.get_services(&self.id).await?;
        characteristics.sort_by(|a, b| a.id.cmp(&b.id));
        let mut characteristic_ids = HashMap::new();
        for service in &characteristics {
            for characteristic in self.facade.get_characteristics(&service.id).await? {
                characteristic_ids.insert(characteristic.uuid, characteristic.id);
            }
        }

        let mut state = self.state.lock().unwrap();
        state.attributes = report.attributes;
        state.permissions = permissions;
        state.landmines = landmines;
        state.characteristic_ids = characteristic_ids;
        state.services_resolved = true;
        Ok(())
    }

    /// Look up the [`CharacteristicId`] for `uuid`, consulting the cache built by
    /// [`refresh_attributes`](Self::refresh_attributes) before falling back to a fresh service
    /// walk if the cache is empty or stale.
    async fn resolve_characteristic(&self, uuid: Uuid) -> Result<CharacteristicId, CoreError> {
        if let Some(id) = self.state.lock().unwrap().characteristic_ids.get(&uuid).cloned() {
            return Ok(id);
        }
        self.refresh_attributes().await?;
        self.state
            .lock()
            .unwrap()
            .characteristic_ids
            .get(&uuid)
            .cloned()
            .ok_or_else(|| CoreError::ServiceNotFound(uuid.to_string()))
    }

    pub async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, CoreError> {
        let id = self.resolve_characteristic(uuid).await?;
        let path: dbus::Path<'static> = id.clone().into();
        let value = self.facade.read_characteristic_value(&id).await?;
        self.signals
            .handle_synthetic(path.to_string(), "org.bluez.GattCharacteristic1", SignalSource::Read);
        Ok(value)
    }

    pub async fn write_characteristic(&self, uuid: Uuid, value: Vec<u8>) -> Result<(), CoreError> {
        let id = self.resolve_characteristic(uuid).await?;
        let path: dbus::Path<'static> = id.clone().into();
        self.facade.write_characteristic_value(&id, value).await?;
        self.signals
            .handle_synthetic(path.to_string(), "org.bluez.GattCharacteristic1", SignalSource::Write);
        Ok(())
    }

    pub async fn enable_notifications(&self, uuid: Uuid) -> Result<(), CoreError> {
        let id = self.resolve_characteristic(uuid).await?;
        self.facade.start_notify(&id).await.map_err(CoreError::Bluetooth)
    }

    pub async fn disable_notifications(&self, uuid: Uuid) -> Result<(), CoreError> {
        let id = self.resolve_characteristic(uuid).await?;
        self.facade.stop_notify(&id).await.map_err(CoreError::Bluetooth)
    }

    /// The landmine report (`no_reply`, `remote_disconnect`, timeouts, and other wire-level
    /// failures) from the last walk, or an empty report if nothing has been walked yet.
    pub fn get_landmine_report(&self) -> LandmineMap {
        self.state.lock().unwrap().landmines.clone()
    }

    /// The permission/security report (`requires_authentication`, `read_not_permitted`, and
    /// similar) from the last walk, or an empty report if nothing has been walked yet.
    pub fn get_security_report(&self) -> PermissionMap {
        self.state.lock().unwrap().permissions.clone()
    }

    /// Judge whether poking at `uuid` is likely to be safe, based on the last walk's permission
    /// and landmine reports. Does not perform a new read; call [`refresh_attributes`] (via
    /// [`force_service_resolution`](Self::force_service_resolution)) first if the device hasn't
    /// been walked yet.
    pub fn check_characteristic_safety(&self, uuid: Uuid) -> CharacteristicSafety {
        let state = self.state.lock().unwrap();
        for category in [
            crate::gatt::map::permission_categories::READ_NOT_PERMITTED,
            crate::gatt::map::permission_categories::WRITE_NOT_PERMITTED,
            crate::gatt::map::permission_categories::NOTIFY_NOT_PERMITTED,
            crate::gatt::map::permission_categories::INDICATE_NOT_PERMITTED,
            crate::gatt::map::permission_categories::REQUIRES_AUTHENTICATION,
            crate::gatt::map::permission_categories::REQUIRES_AUTHORIZATION,
            crate::gatt::map::permission_categories::REQUIRES_ENCRYPTION,
            crate::gatt::map::permission_categories::REQUIRES_SECURE_CONNECTION,
            crate::gatt::map::permission_categories::NOT_SUPPORTED,
            crate::gatt::map::permission_categories::ACCESS_REJECTED,
        ] {
            if state
                .permissions
                .category(ObjectKind::Characteristic, category)
                .contains(&uuid)
            {
                return CharacteristicSafety::RequiresPermission { category };
            }
        }
        for category in [
            crate::gatt::map::landmine_categories::NO_REPLY,
            crate::gatt::map::landmine_categories::REMOTE_DISCONNECT,
            crate::gatt::map::landmine_categories::UNKNOWN_FAILURE,
            crate::gatt::map::landmine_categories::ACTION_IN_PROGRESS,
            crate::gatt::map::landmine_categories::VALUE_ERROR,
            crate::gatt::map::landmine_categories::TIMEOUT,
            crate::gatt::map::landmine_categories::CRASH,
            crate::gatt::map::landmine_categories::OTHER_ERROR,
        ] {
            if state
                .landmines
                .category(ObjectKind::Characteristic, category)
                .contains(&uuid)
            {
                return CharacteristicSafety::Landmine { category };
            }
        }
        if state.attributes.services.values().any(|service| {
            service
                .characteristics
                .get(&uuid)
                .map_or(false, |attr| attr.raw.is_some())
        }) {
            CharacteristicSafety::Safe
        } else {
            CharacteristicSafety::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mac, MockCharacteristic, MockDevice, MockFacade, MockService, ScriptedReads};
    use bluez_async::CharacteristicFlags;
    use std::collections::HashMap as StdHashMap;

    const BATTERY_SERVICE: &str = "0000180f-0000-1000-8000-00805f9b34fb";
    const BATTERY_LEVEL: &str = "00002a19-0000-1000-8000-00805f9b34fb";

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    fn facade() -> MockFacade {
        MockFacade::new(vec![MockDevice {
            mac_address: mac("AA:BB:CC:DD:EE:FF"),
            services: vec![MockService {
                uuid: uuid(BATTERY_SERVICE),
                primary: true,
                characteristics: vec![MockCharacteristic {
                    uuid: uuid(BATTERY_LEVEL),
                    flags: CharacteristicFlags::READ,
                    reads: ScriptedReads::always_ok(vec![0x64]),
                    descriptors: vec![],
                }],
                undeclared: StdHashMap::new(),
            }],
        }])
    }

    #[tokio::test]
    async fn read_characteristic_resolves_id_and_reads_value() {
        let facade = facade();
        let device_id = facade.get_devices().await.unwrap()[0].id.clone();
        let device = Device::new(
            &facade,
            device_id,
            TaxonomyConfig::default(),
            CoreConfig::default(),
            Arc::new(SignalHub::new(Duration::from_secs(30))),
        );

        let value = device.read_characteristic(uuid(BATTERY_LEVEL)).await.unwrap();
        assert_eq!(value, vec![0x64]);
    }

    #[tokio::test]
    async fn reports_are_empty_until_something_has_been_walked() {
        let facade = facade();
        let device_id = facade.get_devices().await.unwrap()[0].id.clone();
        let device = Device::new(
            &facade,
            device_id,
            TaxonomyConfig::default(),
            CoreConfig::default(),
            Arc::new(SignalHub::new(Duration::from_secs(30))),
        );

        assert!(device.get_landmine_report().is_empty());
        assert!(device.get_security_report().is_empty());
        assert_eq!(
            device.check_characteristic_safety(uuid(BATTERY_LEVEL)),
            CharacteristicSafety::Unknown
        );
    }

    #[tokio::test]
    async fn force_service_resolution_populates_reports_and_safety() {
        let facade = facade();
        let device_id = facade.get_devices().await.unwrap()[0].id.clone();
        let device = Device::new(
            &facade,
            device_id,
            TaxonomyConfig::default(),
            CoreConfig::default(),
            Arc::new(SignalHub::new(Duration::from_secs(30))),
        );

        device.force_service_resolution(Duration::from_secs(1)).await.unwrap();

        assert!(device.services_resolved(false).await.unwrap());
        assert_eq!(
            device.check_characteristic_safety(uuid(BATTERY_LEVEL)),
            CharacteristicSafety::Safe
        );
    }
}

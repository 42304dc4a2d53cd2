//! The six end-to-end scenarios exercised against the in-process `MockFacade`: happy-path
//! enumeration, read-not-permitted, flaky in-progress, no-reply landmine, mixed errors, and
//! bruteforce discovery of an undeclared attribute.

use bluez_async::{BluetoothError, CharacteristicFlags};
use blerecon::gatt::{classify_walk_errors, walker};
use blerecon::scan::bruteforce_probe;
use blerecon::testing::{mac, MockCharacteristic, MockDescriptor, MockDevice, MockFacade, MockService, ScriptedReads};
use blerecon::{CoreConfig, ObjectKind, TaxonomyConfig};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

const BATTERY_SERVICE: &str = "0000180f-0000-1000-8000-00805f9b34fb";
const BATTERY_LEVEL: &str = "00002a19-0000-1000-8000-00805f9b34fb";
const CCCD: &str = "00002902-0000-1000-8000-00805f9b34fb";

fn uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap()
}

fn permission_denied() -> BluetoothError {
    BluetoothError::DbusError(dbus::Error::new_custom(
        "org.bluez.Error.NotPermitted",
        "Read not permitted",
    ))
}

fn in_progress() -> BluetoothError {
    BluetoothError::DbusError(dbus::Error::new_custom("org.bluez.Error.InProgress", "in progress"))
}

fn no_reply() -> BluetoothError {
    BluetoothError::DbusError(dbus::Error::new_custom(
        "org.freedesktop.DBus.Error.NoReply",
        "did not receive a reply",
    ))
}

fn not_authorized() -> BluetoothError {
    BluetoothError::DbusError(dbus::Error::new_custom(
        "org.bluez.Error.NotAuthorized",
        "not authorized",
    ))
}

#[tokio::test]
async fn happy_path_enumeration() {
    let facade = MockFacade::new(vec![MockDevice {
        mac_address: mac("AA:BB:CC:DD:EE:FF"),
        services: vec![MockService {
            uuid: uuid(BATTERY_SERVICE),
            primary: true,
            characteristics: vec![MockCharacteristic {
                uuid: uuid(BATTERY_LEVEL),
                flags: CharacteristicFlags::READ,
                reads: ScriptedReads::always_ok(vec![0x42, 0x4c, 0x45]),
                descriptors: vec![],
            }],
            undeclared: HashMap::new(),
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();

    let characteristic = &report.attributes.services[&uuid(BATTERY_SERVICE)].characteristics[&uuid(BATTERY_LEVEL)];
    assert_eq!(characteristic.raw, Some(vec![0x42, 0x4c, 0x45]));
    assert_eq!(characteristic.value.as_deref(), Some("BLE"));

    let (permissions, landmines) = classify_walk_errors(&report.errors);
    assert!(permissions.is_empty());
    assert!(landmines.is_empty());
}

#[tokio::test]
async fn read_not_permitted_is_classified() {
    let facade = MockFacade::new(vec![MockDevice {
        mac_address: mac("AA:BB:CC:DD:EE:FF"),
        services: vec![MockService {
            uuid: uuid(BATTERY_SERVICE),
            primary: true,
            characteristics: vec![MockCharacteristic {
                uuid: uuid(BATTERY_LEVEL),
                flags: CharacteristicFlags::READ,
                reads: ScriptedReads::sequence(vec![Err(permission_denied())]),
                descriptors: vec![],
            }],
            undeclared: HashMap::new(),
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();

    let characteristic = &report.attributes.services[&uuid(BATTERY_SERVICE)].characteristics[&uuid(BATTERY_LEVEL)];
    assert!(characteristic.value.is_none());

    let (permissions, landmines) = classify_walk_errors(&report.errors);
    assert_eq!(
        permissions.category(ObjectKind::Characteristic, "read_not_permitted"),
        &[uuid(BATTERY_LEVEL)]
    );
    assert!(landmines.is_empty());
}

#[tokio::test]
async fn flaky_in_progress_eventually_succeeds() {
    let facade = MockFacade::new(vec![MockDevice {
        mac_address: mac("AA:BB:CC:DD:EE:FF"),
        services: vec![MockService {
            uuid: uuid(BATTERY_SERVICE),
            primary: true,
            characteristics: vec![MockCharacteristic {
                uuid: uuid(BATTERY_LEVEL),
                flags: CharacteristicFlags::READ,
                reads: ScriptedReads::sequence(vec![
                    Err(in_progress()),
                    Err(in_progress()),
                    Ok(vec![0x64]),
                ]),
                descriptors: vec![],
            }],
            undeclared: HashMap::new(),
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();

    let characteristic = &report.attributes.services[&uuid(BATTERY_SERVICE)].characteristics[&uuid(BATTERY_LEVEL)];
    assert_eq!(characteristic.raw, Some(vec![0x64]));

    let (permissions, landmines) = classify_walk_errors(&report.errors);
    assert!(permissions.is_empty());
    assert!(landmines.is_empty());
}

#[tokio::test]
async fn persistent_no_reply_is_a_landmine() {
    let facade = MockFacade::new(vec![MockDevice {
        mac_address: mac("AA:BB:CC:DD:EE:FF"),
        services: vec![MockService {
            uuid: uuid(BATTERY_SERVICE),
            primary: true,
            characteristics: vec![MockCharacteristic {
                uuid: uuid(BATTERY_LEVEL),
                flags: CharacteristicFlags::READ,
                reads: ScriptedReads::sequence(vec![Err(no_reply())]),
                descriptors: vec![],
            }],
            undeclared: HashMap::new(),
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();

    let (permissions, landmines) = classify_walk_errors(&report.errors);
    assert!(permissions.is_empty());
    assert_eq!(
        landmines.category(ObjectKind::Characteristic, "no_reply"),
        &[uuid(BATTERY_LEVEL)]
    );
}

#[tokio::test]
async fn mixed_errors_land_in_distinct_maps() {
    let facade = MockFacade::new(vec![MockDevice {
        mac_address: mac("AA:BB:CC:DD:EE:FF"),
        services: vec![MockService {
            uuid: uuid(BATTERY_SERVICE),
            primary: true,
            characteristics: vec![MockCharacteristic {
                uuid: uuid(BATTERY_LEVEL),
                flags: CharacteristicFlags::READ,
                reads: ScriptedReads::sequence(vec![Err(no_reply())]),
                descriptors: vec![MockDescriptor {
                    uuid: uuid(CCCD),
                    reads: ScriptedReads::sequence(vec![Err(not_authorized())]),
                }],
            }],
            undeclared: HashMap::new(),
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();

    // The descriptor fallback ladder means a NotAuthorized error surfaces on the first attempt
    // and the walker still records a 0x00 placeholder value, but the error itself isn't part of
    // this report's `errors` map since descriptor reads never fail outward. The characteristic
    // error is still classified as a landmine.
    let (permissions, landmines) = classify_walk_errors(&report.errors);
    assert!(permissions.is_empty());
    assert_eq!(
        landmines.category(ObjectKind::Characteristic, "no_reply"),
        &[uuid(BATTERY_LEVEL)]
    );
}

#[tokio::test]
async fn bruteforce_discovers_an_undeclared_attribute() {
    let mut undeclared = HashMap::new();
    undeclared.insert(7u16, vec![0x07]);

    let facade = MockFacade::new(vec![MockDevice {
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
            undeclared,
        }],
    }]);

    let device_id = facade.get_devices().await.unwrap()[0].id.clone();
    let taxonomy = TaxonomyConfig::default();
    let report = walker::walk(&facade, &device_id, &taxonomy, 3, Duration::from_millis(1))
        .await
        .unwrap();
    let mut attributes = report.attributes;

    let mut config = CoreConfig::default();
    config.bruteforce_handle_ceiling = 9;
    bruteforce_probe(&facade, &device_id, &mut attributes, &config)
        .await
        .unwrap();

    let service = &attributes.services[&uuid(BATTERY_SERVICE)];
    assert_eq!(service.characteristics.len(), 2);
    let found = service
        .characteristics
        .values()
        .find(|characteristic| characteristic.handle == Some(7))
        .expect("bruteforce probe should have surfaced handle 7");
    assert_eq!(found.raw, Some(vec![0x07]));
}

//! Deterministic enumeration of one device's GATT tree: services, then characteristics, then
//! descriptors, each level sorted by object path so two walks of the same device produce the
//! same order. Every read goes through [`safe_read_with_retry`] so a handful of transient
//! `no_reply`/`in_progress` errors don't abort the whole walk; whatever finally fails is recorded
//! against the attribute's UUID for the Classification Engine to bucket afterward.

use bluez_async::facade::{no_options, offset_options, BluetoothFacade};
use bluez_async::{BluetoothError, CharacteristicFlags, CharacteristicId, DeviceId, DeviceInfo};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::gatt::map::{AttributeMap, CharacteristicAttribute, DescriptorAttribute, ObjectKind, ServiceAttribute};
use crate::taxonomy::{ResultCode, TaxonomyConfig};

/// Every error observed during a walk, keyed by the UUID of the attribute it happened against,
/// ready for [`crate::gatt::classify::classify`] to turn into permission/landmine categories.
pub type WalkErrors = HashMap<(ObjectKind, Uuid), Vec<ResultCode>>;

pub struct WalkReport {
    pub attributes: AttributeMap,
    pub errors: WalkErrors,
}

/// Enumerate services, characteristics, and descriptors for `device`, reading every
/// characteristic and descriptor value it can. Returns a populated [`AttributeMap`] and the set
/// of errors observed, deferring classification to the caller.
pub async fn walk(
    facade: &dyn BluetoothFacade,
    device: &DeviceId,
    taxonomy: &TaxonomyConfig,
    retry_attempts: u32,
    retry_delay: Duration,
) -> Result<WalkReport, BluetoothError> {
    let _device_info: DeviceInfo = facade.get_device_info(device).await?;

    let mut errors: WalkErrors = HashMap::new();
    let mut services = facade.get_services(device).await?;
    services.sort_by(|a, b| a.id.cmp(&b.id));

    let mut attributes = AttributeMap::default();

    for service in services {
        let mut service_attr = ServiceAttribute {
            handle: service.id.handle(),
            primary: service.primary,
            characteristics: HashMap::new(),
        };

        let mut characteristics = facade.get_characteristics(&service.id).await?;
        characteristics.sort_by(|a, b| a.id.cmp(&b.id));

        for characteristic in characteristics {
            let mut char_attr = CharacteristicAttribute {
                handle: characteristic.id.handle(),
                flags: characteristic.flags.iter().map(|f| format!("{:?}", f)).collect(),
                value: None,
                raw: None,
                descriptors: HashMap::new(),
            };

            let readable = characteristic.flags.contains(CharacteristicFlags::READ)
                || characteristic.flags.contains(CharacteristicFlags::WRITE);
            if readable {
                match safe_read_characteristic(facade, &characteristic.id, retry_attempts, retry_delay).await {
                    Ok(value) => {
                        char_attr.value = printable_ascii(&value);
                        char_attr.raw = Some(value);
                    }
                    Err(err) => {
                        record_error(&mut errors, ObjectKind::Characteristic, characteristic.uuid, taxonomy, &err);
                    }
                }
            }

            let mut descriptors = facade.get_descriptors(&characteristic.id).await?;
            descriptors.sort_by(|a, b| a.id.cmp(&b.id));

            for descriptor in descriptors {
                let value = read_descriptor_with_fallback(facade, &descriptor.id).await;
                let desc_attr = DescriptorAttribute {
                    handle: descriptor.id.handle(),
                    flags: Vec::new(),
                    value: printable_ascii(&value),
                    raw: Some(value),
                };
                char_attr.descriptors.insert(descriptor.uuid, desc_attr);
            }

            service_attr.characteristics.insert(characteristic.uuid, char_attr);
        }

        attributes.services.insert(service.uuid, service_attr);
    }

    Ok(WalkReport { attributes, errors })
}

/// Read a characteristic's value, retrying transient failures up to `attempts` times with
/// `delay` between tries. The final error (if any) is returned untouched for the caller to
/// classify.
async fn safe_read_characteristic(
    facade: &dyn BluetoothFacade,
    id: &CharacteristicId,
    attempts: u32,
    delay: Duration,
) -> Result<Vec<u8>, BluetoothError> {
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match facade.read_characteristic_value(id).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt was made"))
}

/// Three-stage descriptor read fallback: offset-keyed `ReadValue`, then empty-options
/// `ReadValue`, then `Properties.Get("Value")`. If all three fail, returns a single `0x00` byte
/// rather than propagating an error, since a descriptor that can't be read still needs a
/// placeholder entry in the attribute map.
async fn read_descriptor_with_fallback(
    facade: &dyn BluetoothFacade,
    id: &bluez_async::DescriptorId,
) -> Vec<u8> {
    if let Ok(value) = facade.read_descriptor_value_with_options(id, offset_options(0)).await {
        return value;
    }
    if let Ok(value) = facade.read_descriptor_value_with_options(id, no_options()).await {
        return value;
    }
    if let Ok(value) = facade.get_descriptor_value_property(id).await {
        return value;
    }
    vec![0x00]
}

fn record_error(
    errors: &mut WalkErrors,
    kind: ObjectKind,
    uuid: Uuid,
    taxonomy: &TaxonomyConfig,
    error: &BluetoothError,
) {
    let code = taxonomy.classify(error);
    errors.entry((kind, uuid)).or_default().push(code);
}

/// Render `bytes` as a `String` if every byte is printable ASCII (`0x20..=0x7e`), else `None`,
/// per the rule that `Value` is the ASCII decoding when printable and otherwise absent (the raw
/// bytes are always available via `raw`).
fn printable_ascii(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|b| (0x20..=0x7e).contains(b)) {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_decodes_printable_bytes() {
        assert_eq!(printable_ascii(&[0x42, 0x4c, 0x45]), Some("BLE".to_string()));
    }

    #[test]
    fn printable_ascii_rejects_non_printable_bytes() {
        assert_eq!(printable_ascii(&[0x00, 0xff]), None);
    }

    #[test]
    fn printable_ascii_of_empty_bytes_is_empty_string() {
        assert_eq!(printable_ascii(&[]), Some(String::new()));
    }
}

// This file was written by hand in the style of `dbus-codegen-rust` output for the subset of
// org.bluez interfaces this workspace depends on. Keep it mechanical: one trait per D-Bus
// interface, one "*Properties" wrapper per interface with typed accessors, and a constant for
// each interface name.

use dbus::arg::{PropMap, RefArg, Variant};
use dbus::nonblock;
use std::collections::HashMap;
use std::time::Duration;

pub const ORG_BLUEZ_ADAPTER1_NAME: &str = "org.bluez.Adapter1";
pub const ORG_BLUEZ_DEVICE1_NAME: &str = "org.bluez.Device1";
pub const ORG_BLUEZ_GATT_SERVICE1_NAME: &str = "org.bluez.GattService1";
pub const ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME: &str = "org.bluez.GattCharacteristic1";
pub const ORG_BLUEZ_GATT_DESCRIPTOR1_NAME: &str = "org.bluez.GattDescriptor1";
pub const ORG_BLUEZ_AGENT_MANAGER1_NAME: &str = "org.bluez.AgentManager1";
pub const ORG_BLUEZ_AGENT1_NAME: &str = "org.bluez.Agent1";

/// Extracts a typed field out of a `PropMap`, matching the style a codegen tool emits for
/// optional properties.
fn prop<T: 'static + Clone>(props: &PropMap, name: &str) -> Option<T> {
    props.get(name).and_then(|v| dbus::arg::cast::<T>(&v.0)).cloned()
}

macro_rules! interfaces_added_lookup {
    ($props_ty:ident, $name:expr) => {
        impl<'a> $props_ty<'a> {
            pub fn from_interfaces(
                interfaces: &'a HashMap<String, PropMap>,
            ) -> Option<$props_ty<'a>> {
                interfaces.get($name).map($props_ty)
            }
        }
    };
}

#[async_trait::async_trait]
pub trait OrgBluezAdapter1 {
    async fn start_discovery(&self) -> Result<(), dbus::Error>;
    async fn stop_discovery(&self) -> Result<(), dbus::Error>;
    async fn remove_device(&self, device: dbus::Path<'_>) -> Result<(), dbus::Error>;
    async fn set_discovery_filter(&self, properties: PropMap) -> Result<(), dbus::Error>;
    async fn get_address(&self) -> Result<String, dbus::Error>;
    async fn get_powered(&self) -> Result<bool, dbus::Error>;
    async fn set_powered(&self, value: bool) -> Result<(), dbus::Error>;
    async fn get_discoverable(&self) -> Result<bool, dbus::Error>;
    async fn set_discoverable(&self, value: bool) -> Result<(), dbus::Error>;
    async fn get_discovering(&self) -> Result<bool, dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync>
    OrgBluezAdapter1 for nonblock::Proxy<'a, C>
{
    async fn start_discovery(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_ADAPTER1_NAME, "StartDiscovery", ())
            .await
    }

    async fn stop_discovery(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_ADAPTER1_NAME, "StopDiscovery", ())
            .await
    }

    async fn remove_device(&self, device: dbus::Path<'_>) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_ADAPTER1_NAME, "RemoveDevice", (device,))
            .await
    }

    async fn set_discovery_filter(&self, properties: PropMap) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_ADAPTER1_NAME, "SetDiscoveryFilter", (properties,))
            .await
    }

    async fn get_address(&self) -> Result<String, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_ADAPTER1_NAME, "Address").await
    }

    async fn get_powered(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_ADAPTER1_NAME, "Powered").await
    }

    async fn set_powered(&self, value: bool) -> Result<(), dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.set(ORG_BLUEZ_ADAPTER1_NAME, "Powered", value).await
    }

    async fn get_discoverable(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_ADAPTER1_NAME, "Discoverable").await
    }

    async fn set_discoverable(&self, value: bool) -> Result<(), dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.set(ORG_BLUEZ_ADAPTER1_NAME, "Discoverable", value)
            .await
    }

    async fn get_discovering(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_ADAPTER1_NAME, "Discovering").await
    }
}

/// A snapshot of `org.bluez.Adapter1` properties, as delivered by `GetManagedObjects` or a
/// `PropertiesChanged` signal.
pub struct OrgBluezAdapter1Properties<'a>(pub &'a PropMap);

interfaces_added_lookup!(OrgBluezAdapter1Properties, ORG_BLUEZ_ADAPTER1_NAME);

impl<'a> OrgBluezAdapter1Properties<'a> {
    pub fn address(&self) -> Option<&str> {
        prop_str(self.0, "Address")
    }
    pub fn powered(&self) -> Option<bool> {
        prop(self.0, "Powered")
    }
    pub fn discoverable(&self) -> Option<bool> {
        prop(self.0, "Discoverable")
    }
    pub fn discovering(&self) -> Option<bool> {
        prop(self.0, "Discovering")
    }
}

#[async_trait::async_trait]
pub trait OrgBluezDevice1 {
    async fn connect(&self) -> Result<(), dbus::Error>;
    async fn disconnect(&self) -> Result<(), dbus::Error>;
    async fn pair(&self) -> Result<(), dbus::Error>;
    async fn cancel_pairing(&self) -> Result<(), dbus::Error>;
    async fn connect_profile(&self, uuid: &str) -> Result<(), dbus::Error>;
    async fn disconnect_profile(&self, uuid: &str) -> Result<(), dbus::Error>;
    async fn get_trusted(&self) -> Result<bool, dbus::Error>;
    async fn set_trusted(&self, value: bool) -> Result<(), dbus::Error>;
    async fn get_blocked(&self) -> Result<bool, dbus::Error>;
    async fn set_blocked(&self, value: bool) -> Result<(), dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync> OrgBluezDevice1
    for nonblock::Proxy<'a, C>
{
    async fn connect(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "Connect", ())
            .await
    }

    async fn disconnect(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "Disconnect", ())
            .await
    }

    async fn pair(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "Pair", ()).await
    }

    async fn cancel_pairing(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "CancelPairing", ())
            .await
    }

    async fn connect_profile(&self, uuid: &str) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "ConnectProfile", (uuid,))
            .await
    }

    async fn disconnect_profile(&self, uuid: &str) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_DEVICE1_NAME, "DisconnectProfile", (uuid,))
            .await
    }

    async fn get_trusted(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_DEVICE1_NAME, "Trusted").await
    }

    async fn set_trusted(&self, value: bool) -> Result<(), dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.set(ORG_BLUEZ_DEVICE1_NAME, "Trusted", value).await
    }

    async fn get_blocked(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_DEVICE1_NAME, "Blocked").await
    }

    async fn set_blocked(&self, value: bool) -> Result<(), dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.set(ORG_BLUEZ_DEVICE1_NAME, "Blocked", value).await
    }
}

/// A snapshot of `org.bluez.Device1` properties.
pub struct OrgBluezDevice1Properties<'a>(pub &'a PropMap);

interfaces_added_lookup!(OrgBluezDevice1Properties, ORG_BLUEZ_DEVICE1_NAME);

impl<'a> OrgBluezDevice1Properties<'a> {
    pub fn address(&self) -> Option<&str> {
        prop_str(self.0, "Address")
    }
    pub fn address_type(&self) -> Option<&str> {
        prop_str(self.0, "AddressType")
    }
    pub fn name(&self) -> Option<&str> {
        prop_str(self.0, "Name")
    }
    pub fn alias(&self) -> Option<&str> {
        prop_str(self.0, "Alias")
    }
    pub fn class(&self) -> Option<u32> {
        prop(self.0, "Class")
    }
    pub fn appearance(&self) -> Option<u16> {
        prop(self.0, "Appearance")
    }
    pub fn rssi(&self) -> Option<i16> {
        prop(self.0, "RSSI")
    }
    pub fn tx_power(&self) -> Option<i16> {
        prop(self.0, "TxPower")
    }
    pub fn paired(&self) -> Option<bool> {
        prop(self.0, "Paired")
    }
    pub fn trusted(&self) -> Option<bool> {
        prop(self.0, "Trusted")
    }
    pub fn blocked(&self) -> Option<bool> {
        prop(self.0, "Blocked")
    }
    pub fn bonded(&self) -> Option<bool> {
        prop(self.0, "Bonded")
    }
    pub fn connected(&self) -> Option<bool> {
        prop(self.0, "Connected")
    }
    pub fn services_resolved(&self) -> Option<bool> {
        prop(self.0, "ServicesResolved")
    }
    pub fn adapter(&self) -> Option<dbus::Path<'static>> {
        prop(self.0, "Adapter")
    }
    pub fn uuids(&self) -> Option<Vec<String>> {
        prop(self.0, "UUIDs")
    }
    pub fn manufacturer_data(&self) -> Option<HashMap<u16, Variant<Box<dyn RefArg>>>> {
        self.0.get("ManufacturerData").and_then(|v| {
            dbus::arg::cast::<HashMap<u16, Variant<Box<dyn RefArg>>>>(&v.0).cloned()
        })
    }
    pub fn service_data(&self) -> Option<HashMap<String, Variant<Box<dyn RefArg>>>> {
        self.0.get("ServiceData").and_then(|v| {
            dbus::arg::cast::<HashMap<String, Variant<Box<dyn RefArg>>>>(&v.0).cloned()
        })
    }
}

#[async_trait::async_trait]
pub trait OrgBluezGattService1 {
    async fn get_uuid(&self) -> Result<String, dbus::Error>;
    async fn get_primary(&self) -> Result<bool, dbus::Error>;
    async fn get_device(&self) -> Result<dbus::Path<'static>, dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync>
    OrgBluezGattService1 for nonblock::Proxy<'a, C>
{
    async fn get_uuid(&self) -> Result<String, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_SERVICE1_NAME, "UUID").await
    }

    async fn get_primary(&self) -> Result<bool, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_SERVICE1_NAME, "Primary").await
    }

    async fn get_device(&self) -> Result<dbus::Path<'static>, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_SERVICE1_NAME, "Device").await
    }
}

pub struct OrgBluezGattService1Properties<'a>(pub &'a PropMap);

interfaces_added_lookup!(OrgBluezGattService1Properties, ORG_BLUEZ_GATT_SERVICE1_NAME);

impl<'a> OrgBluezGattService1Properties<'a> {
    pub fn uuid(&self) -> Option<&str> {
        prop_str(self.0, "UUID")
    }
    pub fn primary(&self) -> Option<bool> {
        prop(self.0, "Primary")
    }
}

#[async_trait::async_trait]
pub trait OrgBluezGattCharacteristic1 {
    async fn read_value(&self, options: PropMap) -> Result<Vec<u8>, dbus::Error>;
    async fn write_value(&self, value: Vec<u8>, options: PropMap) -> Result<(), dbus::Error>;
    async fn start_notify(&self) -> Result<(), dbus::Error>;
    async fn stop_notify(&self) -> Result<(), dbus::Error>;
    async fn get_uuid(&self) -> Result<String, dbus::Error>;
    async fn get_flags(&self) -> Result<Vec<String>, dbus::Error>;
    async fn get_mtu(&self) -> Result<u16, dbus::Error>;
    async fn get_value(&self) -> Result<Vec<u8>, dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync>
    OrgBluezGattCharacteristic1 for nonblock::Proxy<'a, C>
{
    async fn read_value(&self, options: PropMap) -> Result<Vec<u8>, dbus::Error> {
        self.method_call(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "ReadValue", (options,))
            .await
    }

    async fn write_value(&self, value: Vec<u8>, options: PropMap) -> Result<(), dbus::Error> {
        self.method_call(
            ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME,
            "WriteValue",
            (value, options),
        )
        .await
    }

    async fn start_notify(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "StartNotify", ())
            .await
    }

    async fn stop_notify(&self) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "StopNotify", ())
            .await
    }

    async fn get_uuid(&self) -> Result<String, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "UUID").await
    }

    async fn get_flags(&self) -> Result<Vec<String>, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "Flags").await
    }

    async fn get_mtu(&self) -> Result<u16, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "MTU").await
    }

    async fn get_value(&self) -> Result<Vec<u8>, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME, "Value").await
    }
}

pub struct OrgBluezGattCharacteristic1Properties<'a>(pub &'a PropMap);

interfaces_added_lookup!(
    OrgBluezGattCharacteristic1Properties,
    ORG_BLUEZ_GATT_CHARACTERISTIC1_NAME
);

impl<'a> OrgBluezGattCharacteristic1Properties<'a> {
    pub fn uuid(&self) -> Option<&str> {
        prop_str(self.0, "UUID")
    }
    pub fn flags(&self) -> Option<&Vec<String>> {
        self.0
            .get("Flags")
            .and_then(|v| dbus::arg::cast::<Vec<String>>(&v.0))
    }
    pub fn mtu(&self) -> Option<u16> {
        prop(self.0, "MTU")
    }
    pub fn value(&self) -> Option<&Vec<u8>> {
        self.0
            .get("Value")
            .and_then(|v| dbus::arg::cast::<Vec<u8>>(&v.0))
    }
}

#[async_trait::async_trait]
pub trait OrgBluezGattDescriptor1 {
    async fn read_value(&self, options: PropMap) -> Result<Vec<u8>, dbus::Error>;
    async fn write_value(&self, value: Vec<u8>, options: PropMap) -> Result<(), dbus::Error>;
    async fn get_uuid(&self) -> Result<String, dbus::Error>;
    async fn get_flags(&self) -> Result<Vec<String>, dbus::Error>;
    async fn get_value(&self) -> Result<Vec<u8>, dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync>
    OrgBluezGattDescriptor1 for nonblock::Proxy<'a, C>
{
    async fn read_value(&self, options: PropMap) -> Result<Vec<u8>, dbus::Error> {
        self.method_call(ORG_BLUEZ_GATT_DESCRIPTOR1_NAME, "ReadValue", (options,))
            .await
    }

    async fn write_value(&self, value: Vec<u8>, options: PropMap) -> Result<(), dbus::Error> {
        self.method_call(
            ORG_BLUEZ_GATT_DESCRIPTOR1_NAME,
            "WriteValue",
            (value, options),
        )
        .await
    }

    async fn get_uuid(&self) -> Result<String, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_DESCRIPTOR1_NAME, "UUID").await
    }

    async fn get_flags(&self) -> Result<Vec<String>, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_DESCRIPTOR1_NAME, "Flags").await
    }

    async fn get_value(&self) -> Result<Vec<u8>, dbus::Error> {
        use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
        self.get(ORG_BLUEZ_GATT_DESCRIPTOR1_NAME, "Value").await
    }
}

pub struct OrgBluezGattDescriptor1Properties<'a>(pub &'a PropMap);

interfaces_added_lookup!(
    OrgBluezGattDescriptor1Properties,
    ORG_BLUEZ_GATT_DESCRIPTOR1_NAME
);

impl<'a> OrgBluezGattDescriptor1Properties<'a> {
    pub fn uuid(&self) -> Option<&str> {
        prop_str(self.0, "UUID")
    }
    pub fn flags(&self) -> Option<&Vec<String>> {
        self.0
            .get("Flags")
            .and_then(|v| dbus::arg::cast::<Vec<String>>(&v.0))
    }
    pub fn value(&self) -> Option<&Vec<u8>> {
        self.0
            .get("Value")
            .and_then(|v| dbus::arg::cast::<Vec<u8>>(&v.0))
    }
}

#[async_trait::async_trait]
pub trait OrgBluezAgentManager1 {
    async fn register_agent(
        &self,
        agent: dbus::Path<'_>,
        capability: &str,
    ) -> Result<(), dbus::Error>;
    async fn unregister_agent(&self, agent: dbus::Path<'_>) -> Result<(), dbus::Error>;
    async fn request_default_agent(&self, agent: dbus::Path<'_>) -> Result<(), dbus::Error>;
}

#[async_trait::async_trait]
impl<'a, T: nonblock::NonblockReply, C: std::ops::Deref<Target = T> + Send + Sync>
    OrgBluezAgentManager1 for nonblock::Proxy<'a, C>
{
    async fn register_agent(
        &self,
        agent: dbus::Path<'_>,
        capability: &str,
    ) -> Result<(), dbus::Error> {
        self.method_call(
            ORG_BLUEZ_AGENT_MANAGER1_NAME,
            "RegisterAgent",
            (agent, capability),
        )
        .await
    }

    async fn unregister_agent(&self, agent: dbus::Path<'_>) -> Result<(), dbus::Error> {
        self.method_call(ORG_BLUEZ_AGENT_MANAGER1_NAME, "UnregisterAgent", (agent,))
            .await
    }

    async fn request_default_agent(&self, agent: dbus::Path<'_>) -> Result<(), dbus::Error> {
        self.method_call(
            ORG_BLUEZ_AGENT_MANAGER1_NAME,
            "RequestDefaultAgent",
            (agent,),
        )
        .await
    }
}

fn prop_str<'a>(props: &'a PropMap, name: &str) -> Option<&'a str> {
    props
        .get(name)
        .and_then(|v| dbus::arg::cast::<String>(&v.0))
        .map(String::as_str)
}

/// Default timeout used by generated proxies when callers don't supply their own; the Timeout
/// Manager in `bluez-async` wraps every call with its own deadline regardless.
pub const DEFAULT_METHOD_CALL_TIMEOUT: Duration = Duration::from_secs(30);

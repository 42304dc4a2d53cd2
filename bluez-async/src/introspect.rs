//! Thin wrapper around the standard `org.freedesktop.DBus.Introspectable` interface which parses
//! the returned XML into a list of child node names, the way the rest of this crate walks the
//! BlueZ object tree (devices under adapters, services under devices, and so on).

use crate::BluetoothError;
use dbus::nonblock::stdintf::org_freedesktop_dbus::Introspectable;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename = "node")]
pub(crate) struct Node {
    #[serde(rename = "node", default)]
    pub nodes: Vec<SubNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubNode {
    #[serde(rename = "name")]
    pub name: Option<String>,
}

#[async_trait::async_trait]
pub(crate) trait IntrospectParse {
    async fn introspect_parse(&self) -> Result<Node, BluetoothError>;
}

#[async_trait::async_trait]
impl<T: Introspectable + Sync> IntrospectParse for T {
    async fn introspect_parse(&self) -> Result<Node, BluetoothError> {
        let xml = self.introspect().await?;
        Ok(serde_xml_rs::from_str(&xml)?)
    }
}

//! The nested maps the GATT Walker and Classification Engine build up for one device:
//! [`AttributeMap`] for the tree of values actually read, [`PermissionMap`] and [`LandmineMap`]
//! for the two-axis error taxonomy.

use std::collections::HashMap;
use uuid::Uuid;

/// Which kind of GATT object an entry in [`PermissionMap`]/[`LandmineMap`] refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ObjectKind {
    Service,
    Characteristic,
    Descriptor,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DescriptorAttribute {
    pub handle: Option<u16>,
    pub flags: Vec<String>,
    pub value: Option<String>,
    pub raw: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CharacteristicAttribute {
    pub handle: Option<u16>,
    pub flags: Vec<String>,
    pub value: Option<String>,
    pub raw: Option<Vec<u8>>,
    pub descriptors: HashMap<Uuid, DescriptorAttribute>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceAttribute {
    pub handle: Option<u16>,
    pub primary: bool,
    pub characteristics: HashMap<Uuid, CharacteristicAttribute>,
}

/// Everything read off one device's GATT tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeMap {
    pub services: HashMap<Uuid, ServiceAttribute>,
}

/// `object-kind -> category -> [uuid]`, with an `in_review` holding area for UUIDs whose errors
/// haven't settled into a definitive category.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryMap {
    categories: HashMap<ObjectKind, HashMap<&'static str, Vec<Uuid>>>,
    in_review: HashMap<ObjectKind, Vec<Uuid>>,
}

impl CategoryMap {
    pub fn record(&mut self, kind: ObjectKind, category: &'static str, uuid: Uuid) {
        let by_kind = self.categories.entry(kind).or_default();
        let list = by_kind.entry(category).or_default();
        if !list.contains(&uuid) {
            list.push(uuid);
        }
    }

    pub fn record_in_review(&mut self, kind: ObjectKind, uuid: Uuid) {
        let list = self.in_review.entry(kind).or_default();
        if !list.contains(&uuid) {
            list.push(uuid);
        }
    }

    pub fn category(&self, kind: ObjectKind, category: &str) -> &[Uuid] {
        self.categories
            .get(&kind)
            .and_then(|by_category| by_category.get(category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn in_review(&self, kind: ObjectKind) -> &[Uuid] {
        self.in_review.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|m| m.values().all(Vec::is_empty))
            && self.in_review.values().all(Vec::is_empty)
    }

    /// Drop any category/`in_review` entries that ended up empty, so an all-clean walk reports a
    /// map with no dangling keys rather than a forest of empty `Vec`s.
    pub fn prune_empty(&mut self) {
        for by_category in self.categories.values_mut() {
            by_category.retain(|_, list| !list.is_empty());
        }
        self.categories.retain(|_, by_category| !by_category.is_empty());
        self.in_review.retain(|_, list| !list.is_empty());
    }
}

pub type PermissionMap = CategoryMap;
pub type LandmineMap = CategoryMap;

pub mod permission_categories {
    pub const READ_NOT_PERMITTED: &str = "read_not_permitted";
    pub const WRITE_NOT_PERMITTED: &str = "write_not_permitted";
    pub const NOTIFY_NOT_PERMITTED: &str = "notify_not_permitted";
    pub const INDICATE_NOT_PERMITTED: &str = "indicate_not_permitted";
    pub const REQUIRES_AUTHENTICATION: &str = "requires_authentication";
    pub const REQUIRES_AUTHORIZATION: &str = "requires_authorization";
    pub const REQUIRES_ENCRYPTION: &str = "requires_encryption";
    pub const REQUIRES_SECURE_CONNECTION: &str = "requires_secure_connection";
    pub const NOT_SUPPORTED: &str = "not_supported";
    pub const ACCESS_REJECTED: &str = "access_rejected";
}

pub mod landmine_categories {
    pub const NO_REPLY: &str = "no_reply";
    pub const REMOTE_DISCONNECT: &str = "remote_disconnect";
    pub const UNKNOWN_FAILURE: &str = "unknown_failure";
    pub const ACTION_IN_PROGRESS: &str = "action_in_progress";
    pub const VALUE_ERROR: &str = "value_error";
    pub const TIMEOUT: &str = "timeout";
    pub const CRASH: &str = "crash";
    pub const OTHER_ERROR: &str = "other_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_removes_empty_keys() {
        let mut map = CategoryMap::default();
        map.record(ObjectKind::Characteristic, "x", Uuid::nil());
        map.categories
            .get_mut(&ObjectKind::Characteristic)
            .unwrap()
            .get_mut("x")
            .unwrap()
            .clear();
        map.prune_empty();
        assert!(map.is_empty());
    }

    #[test]
    fn record_dedupes() {
        let mut map = CategoryMap::default();
        map.record(ObjectKind::Service, "read_not_permitted", Uuid::nil());
        map.record(ObjectKind::Service, "read_not_permitted", Uuid::nil());
        assert_eq!(map.category(ObjectKind::Service, "read_not_permitted").len(), 1);
    }
}

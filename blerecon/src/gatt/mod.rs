//! GATT Walker and Classification Engine: enumerate a device's attribute tree, then turn the
//! errors the walk observed into the two-axis permission/landmine taxonomy.

pub mod classify;
pub mod map;
pub mod walker;

use uuid::Uuid;

use map::{LandmineMap, ObjectKind, PermissionMap};
use walker::WalkErrors;

/// Classify every error a walk observed into a [`PermissionMap`] and [`LandmineMap`], pruning
/// empty entries before returning.
pub fn classify_walk_errors(errors: &WalkErrors) -> (PermissionMap, LandmineMap) {
    let mut permissions = PermissionMap::default();
    let mut landmines = LandmineMap::default();

    for ((kind, uuid), codes) in errors {
        let (permission, landmine) = classify::classify(*kind, codes);
        match (permission, landmine) {
            (None, None) => record_in_review(&mut permissions, &mut landmines, *kind, *uuid),
            (permission, landmine) => {
                if let Some(category) = permission {
                    permissions.record(*kind, category, *uuid);
                }
                if let Some(category) = landmine {
                    landmines.record(*kind, category, *uuid);
                }
            }
        }
    }

    permissions.prune_empty();
    landmines.prune_empty();
    (permissions, landmines)
}

fn record_in_review(permissions: &mut PermissionMap, landmines: &mut LandmineMap, kind: ObjectKind, uuid: Uuid) {
    permissions.record_in_review(kind, uuid);
    landmines.record_in_review(kind, uuid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ResultCode;
    use std::collections::HashMap;

    #[test]
    fn unclassifiable_errors_land_in_review() {
        let uuid = Uuid::nil();
        let mut errors: WalkErrors = HashMap::new();
        errors.insert((ObjectKind::Characteristic, uuid), vec![ResultCode::InvalidArguments]);

        let (permissions, landmines) = classify_walk_errors(&errors);
        assert_eq!(permissions.in_review(ObjectKind::Characteristic), &[uuid]);
        assert_eq!(landmines.in_review(ObjectKind::Characteristic), &[uuid]);
    }

    #[test]
    fn classified_errors_do_not_land_in_review() {
        let uuid = Uuid::nil();
        let mut errors: WalkErrors = HashMap::new();
        errors.insert((ObjectKind::Characteristic, uuid), vec![ResultCode::ReadNotPermitted]);

        let (permissions, landmines) = classify_walk_errors(&errors);
        assert!(permissions.in_review(ObjectKind::Characteristic).is_empty());
        assert!(landmines.in_review(ObjectKind::Characteristic).is_empty());
    }
}

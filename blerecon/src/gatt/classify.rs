//! Turns the list of [`ResultCode`]s accumulated for one attribute UUID into its permission and
//! landmine categories, following the precedence rules a careful reading of BlueZ's actual error
//! behavior settles on: more specific verbs before generic ones, and descriptors get the
//! generic-`not_permitted` fallback a characteristic wouldn't.

use crate::gatt::map::{landmine_categories as lc, permission_categories as pc, ObjectKind};
use crate::taxonomy::ResultCode;

/// Classify the error codes observed for one attribute, returning the permission category (if
/// any) and the landmine category (if any). A UUID may land in both.
pub fn classify(kind: ObjectKind, codes: &[ResultCode]) -> (Option<&'static str>, Option<&'static str>) {
    (classify_permission(kind, codes), classify_landmine(codes))
}

fn classify_permission(kind: ObjectKind, codes: &[ResultCode]) -> Option<&'static str> {
    if codes.contains(&ResultCode::ReadNotPermitted) {
        return Some(pc::READ_NOT_PERMITTED);
    }
    if codes.contains(&ResultCode::NotAuthorized) {
        return Some(pc::REQUIRES_AUTHENTICATION);
    }
    if codes.contains(&ResultCode::NotSupported) {
        return Some(pc::NOT_SUPPORTED);
    }
    if codes.contains(&ResultCode::WriteNotPermitted) {
        return Some(pc::WRITE_NOT_PERMITTED);
    }
    if codes.contains(&ResultCode::NotifyNotPermitted) {
        return Some(pc::NOTIFY_NOT_PERMITTED);
    }
    if codes.contains(&ResultCode::IndicateNotPermitted) {
        return Some(pc::INDICATE_NOT_PERMITTED);
    }
    if codes.contains(&ResultCode::NotPermitted) {
        return Some(if kind == ObjectKind::Descriptor {
            pc::NOTIFY_NOT_PERMITTED
        } else {
            pc::WRITE_NOT_PERMITTED
        });
    }
    None
}

fn classify_landmine(codes: &[ResultCode]) -> Option<&'static str> {
    if codes.contains(&ResultCode::NoReply) {
        return Some(lc::NO_REPLY);
    }
    if codes.contains(&ResultCode::RemoteDisconnect) {
        return Some(lc::REMOTE_DISCONNECT);
    }
    if codes.contains(&ResultCode::UnknownConnectFailure) {
        return Some(lc::UNKNOWN_FAILURE);
    }
    if codes.contains(&ResultCode::InProgress) {
        return Some(lc::ACTION_IN_PROGRESS);
    }
    if codes.iter().any(|c| {
        matches!(
            c,
            ResultCode::MethodCallFailed | ResultCode::Other | ResultCode::Timeout
        )
    }) {
        return Some(lc::OTHER_ERROR);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_not_permitted_wins_over_not_authorized() {
        let (perm, mine) = classify(
            ObjectKind::Characteristic,
            &[ResultCode::NotAuthorized, ResultCode::ReadNotPermitted],
        );
        assert_eq!(perm, Some(pc::READ_NOT_PERMITTED));
        assert_eq!(mine, None);
    }

    #[test]
    fn generic_not_permitted_maps_by_object_kind() {
        let (char_perm, _) = classify(ObjectKind::Characteristic, &[ResultCode::NotPermitted]);
        assert_eq!(char_perm, Some(pc::WRITE_NOT_PERMITTED));

        let (desc_perm, _) = classify(ObjectKind::Descriptor, &[ResultCode::NotPermitted]);
        assert_eq!(desc_perm, Some(pc::NOTIFY_NOT_PERMITTED));
    }

    #[test]
    fn mixed_permission_and_landmine() {
        let (perm, mine) = classify(ObjectKind::Descriptor, &[ResultCode::NotAuthorized]);
        assert_eq!(perm, Some(pc::REQUIRES_AUTHENTICATION));
        assert_eq!(mine, None);

        let (_, mine) = classify(ObjectKind::Characteristic, &[ResultCode::NoReply]);
        assert_eq!(mine, Some(lc::NO_REPLY));
    }

    #[test]
    fn no_reply_outranks_in_progress() {
        let (_, mine) = classify(
            ObjectKind::Characteristic,
            &[ResultCode::InProgress, ResultCode::NoReply],
        );
        assert_eq!(mine, Some(lc::NO_REPLY));
    }
}

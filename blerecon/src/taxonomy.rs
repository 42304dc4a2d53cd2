//! Maps the error names and messages BlueZ actually returns over D-Bus onto a closed set of
//! result codes, which the Classification Engine then buckets into permission/landmine
//! categories. The exact substrings are host-daemon-version-dependent, so the table is
//! overridable via [`TaxonomyConfig`]; the defaults below match what a stock BlueZ reports.

use bluez_async::BluetoothError;
use serde::Deserialize;

/// A low-level outcome of a single D-Bus attribute access, wide enough to preserve the
/// distinctions the Classification Engine needs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResultCode {
    Success,
    ReadNotPermitted,
    WriteNotPermitted,
    NotifyNotPermitted,
    IndicateNotPermitted,
    NotPermitted,
    NotAuthorized,
    NotSupported,
    InvalidArguments,
    NotFound,
    NoReply,
    Timeout,
    InProgress,
    RemoteDisconnect,
    UnknownConnectFailure,
    MethodCallFailed,
    Other,
}

/// One entry of the taxonomy table: an error-name match (exact) or message substring match
/// (applied only if no name matched), in descending specificity.
#[derive(Clone, Debug, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default = "default_name_rules")]
    pub name_rules: Vec<(String, ResultCodeName)>,
    #[serde(default = "default_message_rules")]
    pub message_rules: Vec<(String, ResultCodeName)>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            name_rules: default_name_rules(),
            message_rules: default_message_rules(),
        }
    }
}

/// Serializable mirror of [`ResultCode`], since `ResultCode` itself has no meaningful string
/// round-trip and we want the config file to read `"read_not_permitted"` rather than a number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCodeName {
    ReadNotPermitted,
    WriteNotPermitted,
    NotifyNotPermitted,
    IndicateNotPermitted,
    NotPermitted,
    NotAuthorized,
    NotSupported,
    InvalidArguments,
    NotFound,
    NoReply,
    Timeout,
    InProgress,
    RemoteDisconnect,
    UnknownConnectFailure,
    MethodCallFailed,
    Other,
}

impl From<ResultCodeName> for ResultCode {
    fn from(name: ResultCodeName) -> Self {
        match name {
            ResultCodeName::ReadNotPermitted => ResultCode::ReadNotPermitted,
            ResultCodeName::WriteNotPermitted => ResultCode::WriteNotPermitted,
            ResultCodeName::NotifyNotPermitted => ResultCode::NotifyNotPermitted,
            ResultCodeName::IndicateNotPermitted => ResultCode::IndicateNotPermitted,
            ResultCodeName::NotPermitted => ResultCode::NotPermitted,
            ResultCodeName::NotAuthorized => ResultCode::NotAuthorized,
            ResultCodeName::NotSupported => ResultCode::NotSupported,
            ResultCodeName::InvalidArguments => ResultCode::InvalidArguments,
            ResultCodeName::NotFound => ResultCode::NotFound,
            ResultCodeName::NoReply => ResultCode::NoReply,
            ResultCodeName::Timeout => ResultCode::Timeout,
            ResultCodeName::InProgress => ResultCode::InProgress,
            ResultCodeName::RemoteDisconnect => ResultCode::RemoteDisconnect,
            ResultCodeName::UnknownConnectFailure => ResultCode::UnknownConnectFailure,
            ResultCodeName::MethodCallFailed => ResultCode::MethodCallFailed,
            ResultCodeName::Other => ResultCode::Other,
        }
    }
}

fn default_name_rules() -> Vec<(String, ResultCodeName)> {
    use ResultCodeName::*;
    vec![
        // `org.bluez.Error.NotPermitted` deliberately has no name rule: BlueZ reuses this one
        // error name for read/write/notify/indicate-not-permitted alike, distinguishing them only
        // in the message text, so it falls through to `message_rules` below.
        ("org.bluez.Error.NotAuthorized".into(), NotAuthorized),
        ("org.bluez.Error.NotSupported".into(), NotSupported),
        ("org.bluez.Error.InvalidArguments".into(), InvalidArguments),
        ("org.bluez.Error.InProgress".into(), InProgress),
        ("org.bluez.Error.DoesNotExist".into(), NotFound),
        (
            "org.freedesktop.DBus.Error.NoReply".into(),
            NoReply,
        ),
        (
            "org.freedesktop.DBus.Error.UnknownObject".into(),
            NotFound,
        ),
        (
            "org.freedesktop.DBus.Error.Timeout".into(),
            Timeout,
        ),
    ]
}

fn default_message_rules() -> Vec<(String, ResultCodeName)> {
    use ResultCodeName::*;
    vec![
        ("read not permitted".into(), ReadNotPermitted),
        ("write not permitted".into(), WriteNotPermitted),
        ("notify not permitted".into(), NotifyNotPermitted),
        ("indicate not permitted".into(), IndicateNotPermitted),
        ("not permitted".into(), NotPermitted),
        ("not connected".into(), RemoteDisconnect),
        ("software caused connection abort".into(), RemoteDisconnect),
        ("connection attempt failed".into(), UnknownConnectFailure),
        ("in progress".into(), InProgress),
        ("operation already in progress".into(), InProgress),
        ("did not receive a reply".into(), NoReply),
        ("timed out".into(), Timeout),
        ("failed".into(), MethodCallFailed),
    ]
}

impl TaxonomyConfig {
    /// Classify a `BluetoothError`, preferring an exact D-Bus error-name match and falling back to
    /// a message substring match when the name doesn't match any rule (notably
    /// `org.bluez.Error.NotPermitted`, which BlueZ reuses for several distinct verbs); unrecognized
    /// errors map to [`ResultCode::Other`].
    pub fn classify(&self, error: &BluetoothError) -> ResultCode {
        if let BluetoothError::DbusError(dbus_error) = error {
            if let Some(name) = dbus_error.name() {
                for (pattern, code) in &self.name_rules {
                    if name == pattern {
                        return (*code).into();
                    }
                }
            }
            let message = dbus_error.message().unwrap_or_default().to_lowercase();
            for (pattern, code) in &self.message_rules {
                if message.contains(pattern.as_str()) {
                    return (*code).into();
                }
            }
            return ResultCode::Other;
        }
        if matches!(error, BluetoothError::Timeout { .. }) {
            return ResultCode::Timeout;
        }
        ResultCode::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbus::Error as DbusError;

    fn dbus_err(name: &str, message: &str) -> BluetoothError {
        BluetoothError::DbusError(DbusError::new_custom(name, message))
    }

    #[test]
    fn not_permitted_name_falls_through_to_verb_specific_message() {
        let taxonomy = TaxonomyConfig::default();
        let error = dbus_err("org.bluez.Error.NotPermitted", "read not permitted");
        assert_eq!(taxonomy.classify(&error), ResultCode::ReadNotPermitted);
    }

    #[test]
    fn not_permitted_name_without_a_specific_verb_is_generic() {
        let taxonomy = TaxonomyConfig::default();
        let error = dbus_err("org.bluez.Error.NotPermitted", "not permitted");
        assert_eq!(taxonomy.classify(&error), ResultCode::NotPermitted);
    }

    #[test]
    fn specific_message_outranks_generic() {
        let taxonomy = TaxonomyConfig::default();
        let error = dbus_err("org.bluez.Error.Failed", "Read not permitted");
        assert_eq!(taxonomy.classify(&error), ResultCode::ReadNotPermitted);
    }

    #[test]
    fn unrecognized_is_other() {
        let taxonomy = TaxonomyConfig::default();
        let error = dbus_err("org.bluez.Error.Failed", "something bizarre happened");
        assert_eq!(taxonomy.classify(&error), ResultCode::Other);
    }
}

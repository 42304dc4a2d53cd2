use dbus::Path;
use std::fmt::{self, Display, Formatter};

/// Opaque identifier for a Bluetooth adapter (radio controller) known to BlueZ, such as `hci0`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AdapterId {
    pub(crate) object_path: Path<'static>,
}

impl AdapterId {
    /// Construct an adapter ID from a raw D-Bus object path, e.g. `/org/bluez/hci0`.
    pub fn new(object_path: &str) -> Self {
        Self {
            object_path: object_path.to_owned().into(),
        }
    }
}

impl From<AdapterId> for Path<'static> {
    fn from(id: AdapterId) -> Self {
        id.object_path
    }
}

impl Display for AdapterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.object_path
                .to_string()
                .strip_prefix("/org/bluez/")
                .ok_or(fmt::Error)?
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strips_prefix() {
        let id = AdapterId::new("/org/bluez/hci0");
        assert_eq!(id.to_string(), "hci0");
    }
}

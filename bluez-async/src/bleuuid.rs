//! Helpers for converting between the short (16-bit or 32-bit) and full 128-bit forms of
//! Bluetooth SIG UUIDs.

use uuid::Uuid;

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Extension trait adding conversions to and from the Bluetooth SIG's 16-/32-bit short UUID
/// forms.
pub trait BleUuid {
    /// Get the short form of this UUID, if it is derived from the Bluetooth base UUID.
    fn short_form(&self) -> Option<u32>;
}

impl BleUuid for Uuid {
    fn short_form(&self) -> Option<u32> {
        let value = self.as_u128();
        let suffix = value & 0x0000_0000_ffff_ffff_ffff_ffff_ffff_ffff;
        if suffix == (BLUETOOTH_BASE_UUID & 0x0000_0000_ffff_ffff_ffff_ffff_ffff_ffff) {
            Some((value >> 96) as u32)
        } else {
            None
        }
    }
}

/// Construct the full 128-bit UUID corresponding to the given 16-bit Bluetooth SIG UUID.
pub fn uuid_from_u16(short: u16) -> Uuid {
    uuid_from_u32(short as u32)
}

/// Construct the full 128-bit UUID corresponding to the given 32-bit Bluetooth SIG UUID.
pub fn uuid_from_u32(short: u32) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | BLUETOOTH_BASE_UUID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_u16() {
        let uuid = uuid_from_u16(0x180a);
        assert_eq!(uuid.short_form(), Some(0x180a));
    }

    #[test]
    fn non_sig_uuid_has_no_short_form() {
        let uuid = Uuid::parse_str("ebe0ccb9-7a0a-4b0c-8a1a-6ff2997da3a6").unwrap();
        assert_eq!(uuid.short_form(), None);
    }
}

//! Conversions between the canonical `0x%04X` hex representation of a GATT attribute handle and
//! its integer value, accepting the loose input forms operators actually type: a bare decimal
//! number, a `0x`-prefixed hex string, or the 4-hex-digit suffix BlueZ uses in object paths.

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum HandleParseError {
    #[error("{0:?} is not a valid attribute handle")]
    Invalid(String),
}

/// Render `handle` as the canonical uppercase `0x%04X` form.
pub fn handle_int_to_hex(handle: u16) -> String {
    format!("0x{:04X}", handle)
}

/// Parse a handle from decimal, `0x`-prefixed hex, or a bare 4-hex-digit string.
pub fn handle_hex_to_int(input: &str) -> Result<u16, HandleParseError> {
    let trimmed = input.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u16::from_str_radix(hex, 16)
            .map_err(|_| HandleParseError::Invalid(input.to_owned()));
    }
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(value) = u16::from_str_radix(trimmed, 16) {
            return Ok(value);
        }
    }
    trimmed
        .parse::<u16>()
        .map_err(|_| HandleParseError::Invalid(input.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for handle in [0x0001u16, 0x0022, 0xffff] {
            let hex = handle_int_to_hex(handle);
            assert_eq!(handle_hex_to_int(&hex).unwrap(), handle);
        }
    }

    #[test]
    fn accepts_decimal() {
        assert_eq!(handle_hex_to_int("34").unwrap(), 34);
    }

    #[test]
    fn accepts_bare_four_digit_hex() {
        assert_eq!(handle_hex_to_int("0022").unwrap(), 0x0022);
    }

    #[test]
    fn rejects_garbage() {
        assert!(handle_hex_to_int("not-a-handle").is_err());
    }
}

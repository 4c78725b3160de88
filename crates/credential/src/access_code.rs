//! Legacy door code
//!
//! Access panels that predate signed credentials key on a 10-digit decimal
//! number. It is the last 4 bytes of the UID read as a big-endian `u32`,
//! zero-padded to 10 digits.

use nfc_access_tag::uid::canonical_hex;

/// Number of hex digits feeding the code
const WINDOW: usize = 8;

/// Width of the decimal code
pub const CODE_WIDTH: usize = 10;

/// Door code for `uid`, `None` when fewer than 4 bytes are available
pub fn derive(uid: &str) -> Option<String> {
    let clean = canonical_hex(uid);
    let window = clean.get(clean.len().checked_sub(WINDOW)?..)?;
    let value = u32::from_str_radix(window, 16).ok()?;
    Some(format!("{value:0width$}", width = CODE_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_uses_last_four_bytes() {
        assert_eq!(derive("04A1B2C3D4E5").as_deref(), Some("2999178469"));
        assert_eq!(derive("04:a1:b2:c3").as_deref(), Some("0077705923"));
        assert_eq!(derive("A1B2C3D4").as_deref(), Some("2712847316"));
    }

    #[test]
    fn test_derive_pads_to_ten_digits() {
        assert_eq!(derive("0000002A").as_deref(), Some("0000000042"));
        assert_eq!(derive("00000000").as_deref(), Some("0000000000"));
        assert_eq!(derive("FFFFFFFF").as_deref(), Some("4294967295"));
    }

    #[test]
    fn test_derive_short_uid() {
        assert_eq!(derive("0011"), None);
        assert_eq!(derive(""), None);
        assert_eq!(derive("A1B2C3D"), None);
        assert_eq!(derive("zz:zz:zz:zz"), None);
    }
}

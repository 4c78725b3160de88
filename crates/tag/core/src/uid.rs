//! UID formatting helpers
//!
//! UIDs travel as uppercase hex strings. Anything that is not a hex digit
//! (separators, whitespace) is ignored when a string is turned back into
//! bytes.

/// Uppercase hex of raw identifier bytes
pub fn uid_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Strip non-hex characters and uppercase the rest
pub fn canonical_hex(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Raw bytes of a hex UID string
///
/// The string is canonicalized first; a dangling odd nibble is dropped.
pub fn uid_bytes(input: &str) -> Vec<u8> {
    let mut clean = canonical_hex(input);
    if clean.len() % 2 == 1 {
        clean.pop();
    }
    // Only hex digits remain, decoding cannot fail
    hex::decode(&clean).unwrap_or_default()
}

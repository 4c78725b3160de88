//! Signed note grammar
//!
//! A note is a `;`-separated list of `KEY=VALUE` pairs:
//!
//! ```text
//! UID=04A1B2C3D4E580;SIG=<base64>;ALG=ED25519;VER=1
//! ```
//!
//! Order does not matter, unknown keys are ignored and malformed segments
//! are dropped.

use std::collections::HashMap;
use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};

/// vCard property carrying the note
pub const NOTE_PREFIX: &str = "NOTE:";
/// Signature algorithm tag
pub const ALGORITHM: &str = "ED25519";
/// Note format version
pub const VERSION: u32 = 1;

/// Field names
pub mod field {
    /// Hex UID the signature is bound to
    pub const UID: &str = "UID";
    /// Base64 signature
    pub const SIG: &str = "SIG";
    /// Algorithm tag
    pub const ALG: &str = "ALG";
    /// Format version
    pub const VER: &str = "VER";
}

/// Split a note into its fields
///
/// Never fails: segments without `=` or with an empty key are skipped, keys
/// and values are trimmed and a repeated key keeps its last value.
pub fn parse_note(text: &str) -> HashMap<String, String> {
    text.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Whether a credential line is a note line
pub fn is_note_line(line: &str) -> bool {
    line.get(..NOTE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(NOTE_PREFIX))
}

/// A structured note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Canonical hex UID
    pub uid: String,
    /// Raw signature bytes
    pub signature: Vec<u8>,
    /// Algorithm tag
    pub algorithm: String,
    /// Format version
    pub version: u32,
}

impl Note {
    /// Note for `uid` signed with the current algorithm and version
    pub fn new(uid: impl Into<String>, signature: Vec<u8>) -> Self {
        Self {
            uid: uid.into(),
            signature,
            algorithm: ALGORITHM.to_string(),
            version: VERSION,
        }
    }

    /// Structured view of a note
    ///
    /// `None` when `UID` or `SIG` is missing or the signature is not base64.
    /// A missing `ALG` or `VER` takes the current value.
    pub fn parse(text: &str) -> Option<Self> {
        let mut fields = parse_note(text);
        let uid = fields.remove(field::UID)?;
        let signature = STANDARD.decode(fields.remove(field::SIG)?).ok()?;
        let algorithm = fields
            .remove(field::ALG)
            .unwrap_or_else(|| ALGORITHM.to_string());
        let version = fields
            .get(field::VER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(VERSION);

        Some(Self {
            uid,
            signature,
            algorithm,
            version,
        })
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={};{}={};{}={};{}={}",
            field::UID,
            self.uid,
            field::SIG,
            STANDARD.encode(&self.signature),
            field::ALG,
            self.algorithm,
            field::VER,
            self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note() {
        let fields = parse_note("UID=04A1;SIG=c2ln;ALG=ED25519;VER=1");
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["UID"], "04A1");
        assert_eq!(fields["SIG"], "c2ln");
    }

    #[test]
    fn test_parse_note_is_order_independent() {
        assert_eq!(
            parse_note("VER=1;SIG=abc=;UID=04"),
            parse_note("UID=04;VER=1;SIG=abc=")
        );
        // Only the first `=` splits, base64 padding survives
        assert_eq!(parse_note("SIG=ab==")["SIG"], "ab==");
    }

    #[test]
    fn test_parse_malformed_note() {
        let fields = parse_note("garbage;;UID=AB");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["UID"], "AB");

        assert!(parse_note("").is_empty());
        assert!(parse_note(";;;=x;").is_empty());
        assert_eq!(parse_note(" UID = 04 ; X=1")["UID"], "04");
    }

    #[test]
    fn test_note_display_and_parse() {
        let note = Note::new("04A1B2", vec![1, 2, 3]);
        let text = note.to_string();
        assert_eq!(text, "UID=04A1B2;SIG=AQID;ALG=ED25519;VER=1");
        assert_eq!(Note::parse(&text), Some(note));
    }

    #[test]
    fn test_note_parse_requires_uid_and_sig() {
        assert_eq!(Note::parse("SIG=AQID"), None);
        assert_eq!(Note::parse("UID=04"), None);
        assert_eq!(Note::parse("UID=04;SIG=***"), None);
        let legacy = Note::parse("UID=04;SIG=AQID").unwrap();
        assert_eq!(legacy.algorithm, ALGORITHM);
        assert_eq!(legacy.version, VERSION);
    }

    #[test]
    fn test_is_note_line() {
        assert!(is_note_line("NOTE:UID=04"));
        assert!(is_note_line("note:x"));
        assert!(!is_note_line("NOTES"));
        assert!(!is_note_line("FN:NOTE:"));
        assert!(!is_note_line("笔记"));
    }
}

//! Reader representation for PC/SC devices

use pcsc::{ReaderState, State};

use crate::util::is_type2_atr;

/// Representation of a PC/SC reader
#[derive(Debug, Clone)]
pub struct PcscReader {
    /// Name of the reader
    name: String,

    /// Whether a tag is in the field
    has_tag: bool,

    /// Answer To Reset synthesized for the tag (if present)
    atr: Option<Vec<u8>>,
}

impl PcscReader {
    /// Create a new reader
    pub const fn new(name: String, has_tag: bool, atr: Option<Vec<u8>>) -> Self {
        Self { name, has_tag, atr }
    }

    /// Create a reader from a reader state
    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        let has_tag = reader_state.event_state().contains(State::PRESENT)
            && !reader_state.event_state().contains(State::EMPTY);

        let atr = has_tag.then(|| reader_state.atr().to_vec());

        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            has_tag,
            atr,
        }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a tag is in the field
    pub const fn has_tag(&self) -> bool {
        self.has_tag
    }

    /// Get the ATR of the tag if present
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }

    /// Whether the tag in the field is an Ultralight / NTAG (Type 2) tag
    pub fn has_type2_tag(&self) -> bool {
        self.atr().is_some_and(is_type2_atr)
    }
}

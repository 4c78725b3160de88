//! Core error type for tag operations
//!
//! Transport failures bubble up unchanged; the remaining variants describe
//! why a tag's NDEF storage could not be used.

use crate::transport::TransportError;

/// Result type for tag operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error type covering NDEF storage on a tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Stored bytes could not be parsed
    #[error("Parse error: {0}")]
    Parse(&'static str),

    /// The capability container marks the tag as write protected
    #[error("Tag is read-only")]
    ReadOnly,

    /// The tag is neither NDEF formatted nor formattable
    #[error("Tag does not support NDEF")]
    UnsupportedFormat,

    /// The message does not fit in the tag's data area
    #[error("NDEF message needs {required} bytes but the tag holds {available}")]
    Capacity {
        /// Bytes required including TLV framing
        required: usize,
        /// Size of the tag's data area
        available: usize,
    },
}

impl Error {
    /// Create a new parse error
    pub const fn parse(message: &'static str) -> Self {
        Self::Parse(message)
    }

    /// Whether this error means the tag left the field
    pub const fn is_tag_lost(&self) -> bool {
        matches!(self, Self::Transport(TransportError::TagLost))
    }
}

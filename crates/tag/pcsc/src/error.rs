//! Error types for the PC/SC backend

use nfc_access_tag::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No tag present on the reader
    #[error("No tag present on reader: {0}")]
    NoTag(String),

    /// The tag left the field
    #[error("Tag was removed")]
    TagRemoved,

    /// The reader answered a pseudo-APDU with an error status word
    #[error("Reader returned status {0:04X}")]
    Status(u16),

    /// The reader's pass-through answer was malformed or reported an error
    #[error("Pass-through failed: {0}")]
    PassThrough(String),
}

impl PcscError {
    /// Whether the error means the tag is gone
    pub const fn is_tag_removed(&self) -> bool {
        matches!(
            self,
            Self::TagRemoved
                | Self::NoTag(_)
                | Self::Pcsc(pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard)
        )
    }
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            e if e.is_tag_removed() => Self::TagLost,
            PcscError::Pcsc(pcsc::Error::Timeout) => Self::Timeout,
            PcscError::ReaderNotFound(_) | PcscError::NoReadersAvailable => Self::Connection,
            e => Self::other(e.to_string()),
        }
    }
}

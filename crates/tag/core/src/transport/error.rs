//! Error types specific to tag transports

use super::Technology;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection error
    #[error("Failed to connect to tag")]
    Connection,

    /// The tag left the field mid-transaction
    #[error("Tag was removed")]
    TagLost,

    /// A command was sent without an open connection
    #[error("Tag is not connected")]
    NotConnected,

    /// The tag does not expose the requested technology
    #[error("Tag does not support {0}")]
    Unsupported(Technology),

    /// The tag answered with a 4-bit NAK
    #[error("Tag answered NAK {0:#04X}")]
    Nak(u8),

    /// The tag answered with an unexpected frame
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Check if this is a NAK from the tag
    pub const fn is_nak(&self) -> bool {
        matches!(self, Self::Nak(_))
    }
}

//! Session failure reasons

use nfc_access_tag::{Error as TagError, TransportError};

/// Why a pending write or upgrade did not complete
///
/// Variants are listed in reporting precedence: a missing key wins over a
/// missing tag, which wins over a failed write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// No usable signing key
    #[error("no key configured")]
    KeyUnavailable,

    /// The tag left the field or never answered
    #[error("tag lost")]
    TagLost,

    /// The tag is write protected
    #[error("tag is read-only")]
    ReadOnly,

    /// The tag cannot hold NDEF data
    #[error("tag does not support NDEF")]
    UnsupportedFormat,

    /// The credential does not fit on the tag
    #[error("credential needs {required} bytes but the tag holds {available}")]
    Capacity {
        /// Bytes required including framing
        required: usize,
        /// Size of the tag's data area
        available: usize,
    },

    /// Any other write failure
    #[error("write failed: {0}")]
    Write(String),
}

impl From<TagError> for FailureReason {
    fn from(err: TagError) -> Self {
        match err {
            TagError::Transport(TransportError::TagLost | TransportError::Timeout) => Self::TagLost,
            TagError::ReadOnly => Self::ReadOnly,
            TagError::UnsupportedFormat => Self::UnsupportedFormat,
            TagError::Capacity {
                required,
                available,
            } => Self::Capacity {
                required,
                available,
            },
            other => Self::Write(other.to_string()),
        }
    }
}

/// Errors raised by [`SessionWorker`](crate::SessionWorker)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread is gone
    #[error("session worker has stopped")]
    Stopped,

    /// The worker thread could not be started
    #[error("cannot spawn session worker: {0}")]
    Spawn(String),
}

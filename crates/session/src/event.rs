//! Events emitted by a tag session

use crossbeam_channel::{Receiver, Sender, unbounded};
use nfc_access_credential::Authenticity;

use crate::error::FailureReason;
use crate::request::RequestKind;

/// Credential written to a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Request that was fulfilled
    pub kind: RequestKind,
    /// Hex UID of the tag
    pub uid: String,
    /// Chip label, `Unknown` outside the NTAG21x family
    pub tag_type: String,
    /// Whether the anti-clone counter is on after the write
    pub counter_enabled: bool,
}

/// What a read of an idle presentation found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReadResult {
    /// Hex UID of the tag
    pub uid: String,
    /// Decoded text of every record, concatenated
    pub text: String,
    /// Anti-clone counter, when enabled and readable
    pub counter: Option<u32>,
    /// Chip label
    pub tag_type: String,
    /// Legacy door code, when the UID is long enough
    pub access_code: Option<String>,
    /// Signature check, `None` without a configured public key
    pub authenticity: Option<Authenticity>,
}

/// One observable step of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request was accepted and waits for a tag
    Waiting(RequestKind),
    /// A request was written to a tag
    Success(WriteOutcome),
    /// A request could not be completed
    Failure {
        /// Request that failed
        kind: RequestKind,
        /// Hex UID of the tag, empty when unknown
        uid: String,
        /// Cause
        reason: FailureReason,
    },
    /// An idle presentation was read
    Read(TagReadResult),
}

impl SessionEvent {
    /// Whether the event ends a pending request
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure { .. })
    }
}

/// Sender half of a subscription
pub type SessionEventSender = Sender<SessionEvent>;
/// Receiver half of a subscription
pub type SessionEventReceiver = Receiver<SessionEvent>;

/// Create an unbounded channel for session events
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    unbounded()
}

//! Tag presence events and their channels

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A tag entering or leaving a reader's field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag was presented to a reader
    Present {
        /// Reader name
        reader: String,
        /// ATR synthesized by the reader
        atr: Vec<u8>,
    },
    /// The tag left the reader's field
    Removed {
        /// Reader name
        reader: String,
    },
}

impl TagEvent {
    /// Name of the reader the event happened on
    pub fn reader(&self) -> &str {
        match self {
            Self::Present { reader, .. } | Self::Removed { reader } => reader,
        }
    }
}

/// Sender for tag events
pub type TagEventSender = Sender<TagEvent>;
/// Receiver for tag events
pub type TagEventReceiver = Receiver<TagEvent>;

/// Create an unbounded channel for tag events
pub fn tag_event_channel() -> (TagEventSender, TagEventReceiver) {
    unbounded()
}

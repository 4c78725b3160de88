//! Transport traits for communicating with tags
//!
//! A transport moves raw NFC-A frames between the host and one physical tag.
//! It knows nothing about NDEF or NTAG memory layout.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Tag technologies a transport may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Technology {
    /// Raw ISO 14443-3A frames
    #[display("NfcA")]
    NfcA,
    /// Page oriented MIFARE Ultralight / NTAG memory access
    #[display("MifareUltralight")]
    Ultralight,
    /// NDEF record storage
    #[display("Ndef")]
    Ndef,
}

/// Trait for a tag currently presented to a reader
///
/// Implementations only move bytes. Opening and closing is driven through
/// [`TagConnection`], which guarantees the close.
pub trait TagTransport: Send + fmt::Debug {
    /// Factory programmed identifier of the tag, `None` if the handle is unusable
    fn uid(&self) -> Option<&[u8]>;

    /// Whether the tag exposes the given technology
    fn supports(&self, technology: Technology) -> bool {
        let _ = technology;
        true
    }

    /// Storage size code reported by the reader without querying the tag
    ///
    /// Matches byte 6 of the GET_VERSION response when known.
    fn reported_storage_size(&self) -> Option<u8> {
        None
    }

    /// Open the session with the tag
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Release the session with the tag
    fn close(&mut self) -> Result<(), TransportError>;

    /// Check if a session is currently open
    fn is_connected(&self) -> bool;

    /// Send a raw frame to the tag and return its answer
    fn transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        trace!(frame = %hex::encode_upper(frame), "Transceiving frame");
        let result = self.do_transceive(frame);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received frame");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transceive");
            }
        }
        result
    }

    /// Internal implementation of transceive
    /// This is the method that concrete implementations should override
    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError>;
}

impl<T: TagTransport + ?Sized> TagTransport for Box<T> {
    fn uid(&self) -> Option<&[u8]> {
        (**self).uid()
    }

    fn supports(&self, technology: Technology) -> bool {
        (**self).supports(technology)
    }

    fn reported_storage_size(&self) -> Option<u8> {
        (**self).reported_storage_size()
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transceive(frame)
    }

    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transceive(frame)
    }
}

/// An open session with a tag through one technology
///
/// The session is closed when the guard is dropped, on every exit path.
pub struct TagConnection<'a, T: TagTransport + ?Sized> {
    transport: &'a mut T,
    technology: Technology,
}

impl<T: TagTransport + ?Sized> fmt::Debug for TagConnection<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagConnection")
            .field("transport", &self.transport)
            .field("technology", &self.technology)
            .finish()
    }
}

impl<'a, T: TagTransport + ?Sized> TagConnection<'a, T> {
    /// Connect to the tag through `technology`
    ///
    /// Fails with [`TransportError::Unsupported`] when the tag lacks the
    /// technology. A failed connect is still followed by a close.
    pub fn open(transport: &'a mut T, technology: Technology) -> Result<Self, TransportError> {
        if !transport.supports(technology) {
            return Err(TransportError::Unsupported(technology));
        }

        if let Err(e) = transport.connect() {
            if let Err(close_error) = transport.close() {
                debug!(error = ?close_error, "Close after failed connect also failed");
            }
            return Err(e);
        }

        trace!(%technology, "Tag connection opened");
        Ok(Self {
            transport,
            technology,
        })
    }

    /// Technology this connection was opened with
    pub const fn technology(&self) -> Technology {
        self.technology
    }

    /// Identifier of the connected tag
    pub fn uid(&self) -> Option<&[u8]> {
        self.transport.uid()
    }

    /// Send a raw frame to the tag
    pub fn transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        self.transport.transceive(frame)
    }
}

impl<T: TagTransport + ?Sized> Drop for TagConnection<'_, T> {
    fn drop(&mut self) {
        match self.transport.close() {
            Ok(()) => trace!(technology = %self.technology, "Tag connection closed"),
            Err(e) => debug!(error = ?e, "Failed to close tag connection"),
        }
    }
}

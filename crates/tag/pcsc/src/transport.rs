//! PC/SC tag transport implementation

use std::{ffi::CString, fmt};

use bytes::Bytes;
use nfc_access_tag::{TagTransport, TransportError};
use pcsc::{Card, Context, Disposition};
use tracing::{debug, trace};

use crate::{config::PcscConfig, error::PcscError, util};

/// Largest answer a reader returns for one pseudo-APDU
const MAX_RESPONSE: usize = 262;

/// Tag transport over a PC/SC contactless reader
///
/// The UID is read once when the transport is created. Each
/// [`connect`](TagTransport::connect) opens a card handle and each
/// [`close`](TagTransport::close) releases it, leaving the tag powered.
pub struct PcscTagTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// UID captured at creation
    uid: Vec<u8>,
}

impl fmt::Debug for PcscTagTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTagTransport")
            .field("reader_name", &self.reader_name)
            .field("uid", &hex::encode_upper(&self.uid))
            .field("connected", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTagTransport {
    /// Create a transport for the tag on `reader_name` and capture its UID
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
            uid: Vec::new(),
        };

        transport.connect_card()?;
        let uid = transport.transmit_apdu(&util::GET_UID);
        transport.disconnect_card();
        transport.uid = uid?;

        debug!(reader = %transport.reader_name, uid = %hex::encode_upper(&transport.uid), "Opened tag");
        Ok(transport)
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Get the ATR of the current tag
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        self.card.as_ref().map_or_else(
            || Err(PcscError::NoTag(self.reader_name.clone())),
            |card| {
                card.get_attribute_owned(pcsc::Attribute::AtrString)
                    .map_err(Into::into)
            },
        )
    }

    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = CString::new(self.reader_name.clone())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        match self.context.connect(
            &reader_cstr,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => {
                Err(PcscError::NoTag(self.reader_name.clone()))
            }
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn disconnect_card(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!(error = ?e, "Failed to release card handle");
            }
        }
    }

    /// Send a pseudo-APDU and return its data without the status word
    fn transmit_apdu(&mut self, apdu: &[u8]) -> Result<Vec<u8>, PcscError> {
        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoTag(self.reader_name.clone()))?;

        let mut buffer = [0u8; MAX_RESPONSE];
        trace!(apdu = %hex::encode_upper(apdu), "Transmitting pseudo-APDU");
        match card.transmit(apdu, &mut buffer) {
            Ok(response) => util::split_status(response).map(<[u8]>::to_vec),
            Err(e) => {
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                    return Err(PcscError::TagRemoved);
                }
                Err(e.into())
            }
        }
    }

    fn transmit_frame(&mut self, frame: &[u8]) -> Result<Bytes, PcscError> {
        let apdu = util::wrap_frame(frame)?;
        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoTag(self.reader_name.clone()))?;

        let mut buffer = [0u8; MAX_RESPONSE];
        match card.transmit(&apdu, &mut buffer) {
            Ok(response) => util::unwrap_frame(response).map(Bytes::copy_from_slice),
            Err(e) => {
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                    return Err(PcscError::TagRemoved);
                }
                Err(e.into())
            }
        }
    }
}

impl TagTransport for PcscTagTransport {
    fn uid(&self) -> Option<&[u8]> {
        (!self.uid.is_empty()).then_some(self.uid.as_slice())
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        self.connect_card().map_err(TransportError::from)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.disconnect_card();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        if self.card.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.transmit_frame(frame).map_err(TransportError::from)
    }
}

impl Drop for PcscTagTransport {
    fn drop(&mut self) {
        self.disconnect_card();
    }
}

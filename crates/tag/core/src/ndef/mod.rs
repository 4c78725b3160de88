//! NDEF encoding and Type 2 tag storage

pub mod message;
pub mod record;
pub mod type2;

pub use message::NdefMessage;
pub use record::{NdefRecord, Tnf};
use tracing::debug;

use crate::chip::TagType;
use crate::error::{Error, Result};
use crate::transport::{TagConnection, TagTransport, Technology};

/// Read the tag's NDEF message through an NDEF connection
pub fn read_message<T: TagTransport + ?Sized>(tag: &mut T) -> Result<NdefMessage> {
    let mut conn = TagConnection::open(tag, Technology::Ndef)?;
    type2::read_ndef(&mut conn)
}

/// Replace the tag's NDEF message
///
/// Tags without NDEF technology are rejected with
/// [`Error::UnsupportedFormat`] before any connection is made.
pub fn write_message<T: TagTransport + ?Sized>(
    tag: &mut T,
    message: &NdefMessage,
    tag_type: TagType,
) -> Result<()> {
    if !tag.supports(Technology::Ndef) {
        debug!("Tag exposes neither NDEF nor a formattable NDEF area");
        return Err(Error::UnsupportedFormat);
    }
    let mut conn = TagConnection::open(tag, Technology::Ndef)?;
    type2::write_ndef(&mut conn, message, tag_type)
}

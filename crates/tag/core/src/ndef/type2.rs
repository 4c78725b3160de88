//! NFC Forum Type 2 tag NDEF mapping
//!
//! Page 3 holds the capability container (CC). The data area starts at page
//! 4 and holds a sequence of TLV blocks; the NDEF message lives in the first
//! NDEF TLV.

use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use super::message::NdefMessage;
use crate::chip::TagType;
use crate::command::{PAGE_SIZE, READ_SIZE};
use crate::error::{Error, Result};
use crate::transport::{TagConnection, TagTransport};

/// Page holding the capability container
pub const CC_PAGE: u8 = 3;
/// First page of the data area
pub const DATA_PAGE: u8 = 4;

/// NDEF magic number in CC byte 0
const NDEF_MAGIC: u8 = 0xE1;
/// Mapping version 1.0
const MAPPING_VERSION: u8 = 0x10;
/// Access byte of a write protected tag
const ACCESS_READ_ONLY: u8 = 0x0F;

/// TLV block types
mod tlv {
    pub(super) const NULL: u8 = 0x00;
    pub(super) const NDEF: u8 = 0x03;
    pub(super) const TERMINATOR: u8 = 0xFE;
    /// Marker announcing a three byte length field
    pub(super) const LONG_LENGTH: u8 = 0xFF;
}

/// Capability container stored in page 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContainer {
    /// NDEF magic number, `0xE1` when formatted
    pub magic: u8,
    /// Mapping version
    pub version: u8,
    /// Data area size divided by 8
    pub size: u8,
    /// Read access in the high nibble, write access in the low nibble
    pub access: u8,
}

impl CapabilityContainer {
    /// Decode page 3
    pub const fn from_bytes(bytes: [u8; PAGE_SIZE]) -> Self {
        Self {
            magic: bytes[0],
            version: bytes[1],
            size: bytes[2],
            access: bytes[3],
        }
    }

    /// Encode as page 3
    pub const fn to_bytes(self) -> [u8; PAGE_SIZE] {
        [self.magic, self.version, self.size, self.access]
    }

    /// Container written when formatting a blank chip
    pub const fn for_tag(tag_type: TagType) -> Option<Self> {
        match tag_type.capability_size() {
            Some(size) => Some(Self {
                magic: NDEF_MAGIC,
                version: MAPPING_VERSION,
                size,
                access: 0x00,
            }),
            None => None,
        }
    }

    /// Never formatted (one-time programmable page still zero)
    pub const fn is_blank(&self) -> bool {
        self.magic == 0 && self.version == 0 && self.size == 0 && self.access == 0
    }

    /// Formatted for NDEF
    pub const fn is_ndef(&self) -> bool {
        self.magic == NDEF_MAGIC
    }

    /// Write access granted
    pub const fn is_writable(&self) -> bool {
        self.access & 0x0F == 0
    }

    /// Whether the container marks the tag read-only
    pub const fn is_read_only(&self) -> bool {
        self.access & 0x0F == ACCESS_READ_ONLY
    }

    /// Size of the data area in bytes
    pub const fn data_area_size(&self) -> usize {
        self.size as usize * 8
    }
}

/// Lazily fetched view of the data area
struct DataArea<'c, 'a, T: TagTransport + ?Sized> {
    conn: &'c mut TagConnection<'a, T>,
    bytes: Vec<u8>,
    next_page: usize,
    limit: usize,
}

impl<T: TagTransport + ?Sized> DataArea<'_, '_, T> {
    /// Make sure `len` bytes of the data area are buffered
    fn ensure(&mut self, len: usize) -> Result<()> {
        if len > self.limit {
            return Err(Error::parse("TLV exceeds data area"));
        }
        while self.bytes.len() < len {
            let page = u8::try_from(self.next_page)
                .map_err(|_| Error::parse("TLV exceeds addressable memory"))?;
            let chunk = self.conn.read_pages(page)?;
            self.bytes.extend_from_slice(&chunk);
            self.next_page += READ_SIZE / PAGE_SIZE;
        }
        Ok(())
    }

    fn byte(&mut self, offset: usize) -> Result<u8> {
        self.ensure(offset + 1)?;
        Ok(self.bytes[offset])
    }

    /// Read a TLV length field at `offset`, returning (length, field size)
    fn length(&mut self, offset: usize) -> Result<(usize, usize)> {
        match self.byte(offset)? {
            tlv::LONG_LENGTH => {
                let hi = self.byte(offset + 1)? as usize;
                let lo = self.byte(offset + 2)? as usize;
                Ok(((hi << 8) | lo, 3))
            }
            len => Ok((len as usize, 1)),
        }
    }
}

/// Read the capability container
pub fn read_capability_container<T: TagTransport + ?Sized>(
    conn: &mut TagConnection<'_, T>,
) -> Result<CapabilityContainer> {
    let raw = conn.read_pages(CC_PAGE)?;
    Ok(CapabilityContainer::from_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Read the NDEF message from the data area
///
/// A formatted tag without an NDEF TLV reads as an empty message. Tags that
/// were never formatted fail with [`Error::UnsupportedFormat`].
pub fn read_ndef<T: TagTransport + ?Sized>(
    conn: &mut TagConnection<'_, T>,
) -> Result<NdefMessage> {
    let raw = conn.read_pages(CC_PAGE)?;
    let cc = CapabilityContainer::from_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if !cc.is_ndef() {
        debug!(?cc, "Capability container is not NDEF formatted");
        return Err(Error::UnsupportedFormat);
    }

    let mut area = DataArea {
        conn,
        // The CC read already returned the first three data pages
        bytes: raw[PAGE_SIZE..].to_vec(),
        next_page: DATA_PAGE as usize + (READ_SIZE - PAGE_SIZE) / PAGE_SIZE,
        limit: cc.data_area_size(),
    };

    let mut offset = 0;
    loop {
        if offset >= area.limit {
            return Ok(NdefMessage::default());
        }
        match area.byte(offset)? {
            tlv::NULL => offset += 1,
            tlv::TERMINATOR => return Ok(NdefMessage::default()),
            kind => {
                let (len, field) = area.length(offset + 1)?;
                let start = offset + 1 + field;
                if kind == tlv::NDEF {
                    area.ensure(start + len)?;
                    debug!(len, "Found NDEF TLV");
                    return NdefMessage::from_bytes(&area.bytes[start..start + len]);
                }
                offset = start + len;
            }
        }
    }
}

/// Frame a message as NDEF TLV plus terminator
fn frame_message(message: &NdefMessage) -> BytesMut {
    let body = message.to_bytes();
    let mut out = BytesMut::with_capacity(body.len() + 5);
    out.put_u8(tlv::NDEF);
    if body.len() < tlv::LONG_LENGTH as usize {
        out.put_u8(body.len() as u8);
    } else {
        out.put_u8(tlv::LONG_LENGTH);
        out.put_u16(body.len() as u16);
    }
    out.put_slice(&body);
    out.put_u8(tlv::TERMINATOR);
    out
}

/// Write `message` as the tag's NDEF content
///
/// A blank chip of a known type is formatted first. Nothing is written when
/// the tag turns out to be read-only, unformattable or too small.
pub fn write_ndef<T: TagTransport + ?Sized>(
    conn: &mut TagConnection<'_, T>,
    message: &NdefMessage,
    tag_type: TagType,
) -> Result<()> {
    let current = read_capability_container(conn)?;
    let (cc, format) = if current.is_blank() {
        let cc = CapabilityContainer::for_tag(tag_type).ok_or(Error::UnsupportedFormat)?;
        (cc, true)
    } else if current.is_ndef() {
        (current, false)
    } else {
        return Err(Error::UnsupportedFormat);
    };

    if !cc.is_writable() {
        return Err(Error::ReadOnly);
    }

    let mut framed = frame_message(message);
    if framed.len() > cc.data_area_size() {
        return Err(Error::Capacity {
            required: framed.len(),
            available: cc.data_area_size(),
        });
    }

    if format {
        conn.write_page(CC_PAGE, &cc.to_bytes())?;
        info!(%tag_type, "Formatted blank tag for NDEF");
    }

    let padded = framed.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
    framed.resize(padded, 0);
    for (i, chunk) in framed.chunks_exact(PAGE_SIZE).enumerate() {
        let page = DATA_PAGE as usize + i;
        let page = u8::try_from(page).map_err(|_| Error::parse("page address overflow"))?;
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(chunk);
        conn.write_page(page, &data)?;
    }

    debug!(bytes = framed.len(), "Wrote NDEF message");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTag;
    use crate::ndef::NdefRecord;
    use crate::transport::{Technology, TransportError};

    const UID: [u8; 7] = [0x04, 0x5A, 0x6B, 0x7C, 0x8D, 0x9E, 0x80];

    fn open(tag: &mut MockTag) -> TagConnection<'_, MockTag> {
        TagConnection::open(tag, Technology::Ndef).unwrap()
    }

    #[test]
    fn test_fresh_tag_reads_empty() {
        let mut tag = MockTag::ntag213(&UID);
        let message = read_ndef(&mut open(&mut tag)).unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let mut tag = MockTag::ntag215(&UID);
        let message = NdefMessage::text_message("zh", "BEGIN:VCARD\nFN:王小明\nEND:VCARD");
        write_ndef(&mut open(&mut tag), &message, TagType::Ntag215).unwrap();

        assert_eq!(tag.page(DATA_PAGE)[0], tlv::NDEF);
        let read = read_ndef(&mut open(&mut tag)).unwrap();
        assert_eq!(read.text(), "BEGIN:VCARD\nFN:王小明\nEND:VCARD");
        assert_eq!(tag.connect_count(), tag.close_count());
    }

    #[test]
    fn test_long_tlv_length() {
        let mut tag = MockTag::ntag216(&UID);
        let text = "TEL:1\n".repeat(60);
        let message = NdefMessage::text_message("en", &text);
        write_ndef(&mut open(&mut tag), &message, TagType::Ntag216).unwrap();

        assert_eq!(tag.page(DATA_PAGE)[1], tlv::LONG_LENGTH);
        assert_eq!(read_ndef(&mut open(&mut tag)).unwrap().text(), text);
    }

    #[test]
    fn test_skips_leading_tlvs() {
        let mut tag = MockTag::ntag213(&UID);
        let body = NdefMessage::text_message("en", "hi").to_bytes();
        let mut area = vec![tlv::NULL, 0x01, 0x03, 0xA0, 0x10, 0x44, tlv::NDEF, body.len() as u8];
        area.extend_from_slice(&body);
        area.push(tlv::TERMINATOR);
        area.resize(area.len().div_ceil(4) * 4, 0);
        {
            let mut conn = open(&mut tag);
            for (i, chunk) in area.chunks_exact(4).enumerate() {
                conn.write_page(DATA_PAGE + i as u8, &chunk.try_into().unwrap())
                    .unwrap();
            }
        }
        assert_eq!(read_ndef(&mut open(&mut tag)).unwrap().text(), "hi");
    }

    #[test]
    fn test_blank_tag_is_formatted() {
        let mut tag = MockTag::ntag213(&UID).blank();
        assert_eq!(
            read_ndef(&mut open(&mut tag)),
            Err(Error::UnsupportedFormat)
        );

        let message = NdefMessage::text_message("en", "x");
        write_ndef(&mut open(&mut tag), &message, TagType::Ntag213).unwrap();
        assert_eq!(tag.page(CC_PAGE), [0xE1, 0x10, 0x12, 0x00]);
        assert_eq!(read_ndef(&mut open(&mut tag)).unwrap(), message);
    }

    #[test]
    fn test_blank_unknown_chip_unsupported() {
        let mut tag = MockTag::ntag213(&UID).blank();
        let message = NdefMessage::text_message("en", "x");
        assert_eq!(
            write_ndef(&mut open(&mut tag), &message, TagType::Unknown),
            Err(Error::UnsupportedFormat)
        );
        assert_eq!(tag.write_count(), 0);
    }

    #[test]
    fn test_read_only_tag_untouched() {
        let mut tag = MockTag::ntag213(&UID).read_only();
        let before = tag.page(DATA_PAGE);
        let message = NdefMessage::text_message("en", "x");
        assert_eq!(
            write_ndef(&mut open(&mut tag), &message, TagType::Ntag213),
            Err(Error::ReadOnly)
        );
        assert_eq!(tag.write_count(), 0);
        assert_eq!(tag.page(DATA_PAGE), before);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut tag = MockTag::ntag213(&UID);
        let message = NdefMessage::new(vec![NdefRecord::text("en", &"x".repeat(200))]);
        let err = write_ndef(&mut open(&mut tag), &message, TagType::Ntag213).unwrap_err();
        assert!(matches!(err, Error::Capacity { available: 144, .. }));
        assert_eq!(tag.write_count(), 0);
    }

    #[test]
    fn test_removed_tag_cannot_open() {
        let mut tag = MockTag::ntag213(&UID);
        let mut conn = open(&mut tag);
        let cc = read_capability_container(&mut conn).unwrap();
        assert!(cc.is_ndef() && cc.is_writable());
        drop(conn);

        tag.remove();
        let err = TagConnection::open(&mut tag, Technology::Ndef).unwrap_err();
        assert_eq!(err, TransportError::TagLost);
    }

    #[test]
    fn test_capability_container_flags() {
        let cc = CapabilityContainer::from_bytes([0xE1, 0x10, 0x3E, 0x0F]);
        assert!(cc.is_ndef());
        assert!(cc.is_read_only());
        assert!(!cc.is_writable());
        assert_eq!(cc.data_area_size(), 496);
        assert!(CapabilityContainer::from_bytes([0; 4]).is_blank());
    }
}

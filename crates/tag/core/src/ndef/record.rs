//! NDEF records

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Record type of a well-known text record
pub const RTD_TEXT: &[u8] = b"T";

mod flags {
    pub(super) const MB: u8 = 0x80;
    pub(super) const ME: u8 = 0x40;
    pub(super) const CF: u8 = 0x20;
    pub(super) const SR: u8 = 0x10;
    pub(super) const IL: u8 = 0x08;
    pub(super) const TNF_MASK: u8 = 0x07;
}

/// Text record status byte: set for UTF-16
const STATUS_UTF16: u8 = 0x80;
/// Text record status byte: language code length
const STATUS_LANG_MASK: u8 = 0x3F;

/// Type name format of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tnf {
    /// Empty record
    Empty,
    /// NFC Forum well-known type
    WellKnown,
    /// RFC 2046 media type
    Media,
    /// Absolute URI
    AbsoluteUri,
    /// NFC Forum external type
    External,
    /// Unknown payload type
    Unknown,
    /// Continuation chunk
    Unchanged,
    /// Reserved value
    Reserved,
}

impl Tnf {
    const fn from_bits(bits: u8) -> Self {
        match bits & flags::TNF_MASK {
            0x00 => Self::Empty,
            0x01 => Self::WellKnown,
            0x02 => Self::Media,
            0x03 => Self::AbsoluteUri,
            0x04 => Self::External,
            0x05 => Self::Unknown,
            0x06 => Self::Unchanged,
            _ => Self::Reserved,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Empty => 0x00,
            Self::WellKnown => 0x01,
            Self::Media => 0x02,
            Self::AbsoluteUri => 0x03,
            Self::External => 0x04,
            Self::Unknown => 0x05,
            Self::Unchanged => 0x06,
            Self::Reserved => 0x07,
        }
    }
}

/// A single NDEF record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    tnf: Tnf,
    record_type: Bytes,
    id: Bytes,
    payload: Bytes,
}

impl NdefRecord {
    /// Create a record from its parts
    pub fn new(tnf: Tnf, record_type: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            tnf,
            record_type: record_type.into(),
            id: Bytes::new(),
            payload: payload.into(),
        }
    }

    /// Create a UTF-8 well-known text record
    pub fn text(language: &str, text: &str) -> Self {
        let language = &language.as_bytes()[..language.len().min(STATUS_LANG_MASK as usize)];
        let mut payload = BytesMut::with_capacity(1 + language.len() + text.len());
        payload.put_u8(language.len() as u8);
        payload.put_slice(language);
        payload.put_slice(text.as_bytes());
        Self::new(Tnf::WellKnown, Bytes::from_static(RTD_TEXT), payload.freeze())
    }

    /// Type name format
    pub const fn tnf(&self) -> Tnf {
        self.tnf
    }

    /// Record type
    pub fn record_type(&self) -> &[u8] {
        &self.record_type
    }

    /// Record payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether this is a well-known text record
    pub fn is_text(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type.as_ref() == RTD_TEXT
    }

    /// Decode the record as text
    ///
    /// Text records honour the status byte: bit 7 selects UTF-16, bits 0-5
    /// give the length of the language code that precedes the text. Any other
    /// record is read as UTF-8. Invalid sequences are replaced, never rejected.
    pub fn decoded_text(&self) -> String {
        if !self.is_text() {
            return String::from_utf8_lossy(&self.payload).into_owned();
        }

        let Some((&status, rest)) = self.payload.split_first() else {
            return String::new();
        };
        let lang_len = (status & STATUS_LANG_MASK) as usize;
        let text = rest.get(lang_len..).unwrap_or_default();

        if status & STATUS_UTF16 != 0 {
            decode_utf16(text)
        } else {
            String::from_utf8_lossy(text).into_owned()
        }
    }

    /// Serialize the record with the given message begin/end flags
    pub(crate) fn encode(&self, first: bool, last: bool, out: &mut BytesMut) {
        let short = self.payload.len() <= u8::MAX as usize;

        let mut header = self.tnf.bits();
        if first {
            header |= flags::MB;
        }
        if last {
            header |= flags::ME;
        }
        if short {
            header |= flags::SR;
        }
        if !self.id.is_empty() {
            header |= flags::IL;
        }

        out.put_u8(header);
        out.put_u8(self.record_type.len() as u8);
        if short {
            out.put_u8(self.payload.len() as u8);
        } else {
            out.put_u32(self.payload.len() as u32);
        }
        if !self.id.is_empty() {
            out.put_u8(self.id.len() as u8);
        }
        out.put_slice(&self.record_type);
        out.put_slice(&self.id);
        out.put_slice(&self.payload);
    }

    /// Parse one record from the front of `data`
    ///
    /// Returns the record, whether it carried the ME flag and the number of
    /// bytes consumed.
    pub(crate) fn decode(data: &[u8]) -> Result<(Self, bool, usize)> {
        let mut cursor = Cursor { data, pos: 0 };

        let header = cursor.u8()?;
        if header & flags::CF != 0 {
            return Err(Error::parse("chunked records are not supported"));
        }

        let type_len = cursor.u8()? as usize;
        let payload_len = if header & flags::SR != 0 {
            cursor.u8()? as usize
        } else {
            u32::from_be_bytes(cursor.take(4)?.try_into().map_err(|_| Error::parse("length"))?)
                as usize
        };
        let id_len = if header & flags::IL != 0 {
            cursor.u8()? as usize
        } else {
            0
        };

        let record_type = Bytes::copy_from_slice(cursor.take(type_len)?);
        let id = Bytes::copy_from_slice(cursor.take(id_len)?);
        let payload = Bytes::copy_from_slice(cursor.take(payload_len)?);

        let record = Self {
            tnf: Tnf::from_bits(header),
            record_type,
            id,
            payload,
        };
        Ok((record, header & flags::ME != 0, cursor.pos))
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(Error::parse("record truncated"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::parse("record truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Decode UTF-16 honouring a byte order mark, big-endian otherwise
fn decode_utf16(bytes: &[u8]) -> String {
    let (little_endian, body) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_record_payload() {
        let record = NdefRecord::text("zh", "FN:Li");
        assert!(record.is_text());
        assert_eq!(record.payload(), b"\x02zhFN:Li");
        assert_eq!(record.decoded_text(), "FN:Li");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut payload = vec![0x80 | 0x02, b'e', b'n', 0xFF, 0xFE];
        payload.extend_from_slice(&[b'O', 0x00, b'K', 0x00]);
        let record = NdefRecord::new(Tnf::WellKnown, RTD_TEXT, payload);
        assert_eq!(record.decoded_text(), "OK");
    }

    #[test]
    fn test_decode_utf16_big_endian_default() {
        let payload = vec![0x80, 0x00, b'h', 0x00, b'i'];
        let record = NdefRecord::new(Tnf::WellKnown, RTD_TEXT, payload);
        assert_eq!(record.decoded_text(), "hi");
    }

    #[test]
    fn test_language_length_exceeds_payload() {
        let record = NdefRecord::new(Tnf::WellKnown, RTD_TEXT, vec![0x05, b'e']);
        assert_eq!(record.decoded_text(), "");
    }

    #[test]
    fn test_empty_text_payload() {
        let record = NdefRecord::new(Tnf::WellKnown, RTD_TEXT, Vec::new());
        assert_eq!(record.decoded_text(), "");
    }

    #[test]
    fn test_non_text_record_is_utf8() {
        let record = NdefRecord::new(Tnf::Media, &b"text/vcard"[..], &b"BEGIN:VCARD"[..]);
        assert!(!record.is_text());
        assert_eq!(record.decoded_text(), "BEGIN:VCARD");
    }

    #[test]
    fn test_long_record_encoding() {
        let text = "x".repeat(300);
        let record = NdefRecord::text("en", &text);
        let mut out = BytesMut::new();
        record.encode(true, true, &mut out);
        // MB | ME | TNF well-known, no SR
        assert_eq!(out[0], 0xC1);
        let (decoded, last, consumed) = NdefRecord::decode(&out).unwrap();
        assert!(last);
        assert_eq!(consumed, out.len());
        assert_eq!(decoded.decoded_text(), text);
    }

    #[test]
    fn test_chunked_record_rejected() {
        assert_eq!(
            NdefRecord::decode(&[0xB1, 0x01, 0x00, b'T']).unwrap_err(),
            Error::parse("chunked records are not supported")
        );
    }

    #[test]
    fn test_truncated_record() {
        assert!(NdefRecord::decode(&[0xD1, 0x01, 0x09, b'T', 0x02]).is_err());
    }
}

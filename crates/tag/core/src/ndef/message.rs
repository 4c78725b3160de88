//! NDEF messages

use bytes::{Bytes, BytesMut};

use super::record::NdefRecord;
use crate::error::{Error, Result};

/// An ordered list of NDEF records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    records: Vec<NdefRecord>,
}

impl NdefMessage {
    /// Create a message from records
    pub const fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    /// Message holding a single UTF-8 text record
    pub fn text_message(language: &str, text: &str) -> Self {
        Self::new(vec![NdefRecord::text(language, text)])
    }

    /// Records in order
    pub fn records(&self) -> &[NdefRecord] {
        &self.records
    }

    /// Whether the message carries no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decoded text of every record, concatenated in order
    pub fn text(&self) -> String {
        self.records.iter().map(NdefRecord::decoded_text).collect()
    }

    /// Parse a message; an empty buffer is an empty message
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let (record, last, consumed) = NdefRecord::decode(&data[offset..])?;
            records.push(record);
            offset += consumed;
            if last {
                break;
            }
        }

        if !records.is_empty() && offset < data.len() {
            return Err(Error::parse("trailing bytes after final record"));
        }
        Ok(Self { records })
    }

    /// Serialize the message
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        let count = self.records.len();
        for (i, record) in self.records.iter().enumerate() {
            record.encode(i == 0, i + 1 == count, &mut out);
        }
        out.freeze()
    }
}

impl From<NdefRecord> for NdefMessage {
    fn from(record: NdefRecord) -> Self {
        Self::new(vec![record])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::record::Tnf;

    #[test]
    fn test_single_text_record_bytes() {
        let message = NdefMessage::text_message("zh", "hi");
        assert_eq!(
            message.to_bytes().as_ref(),
            &[0xD1, 0x01, 0x05, b'T', 0x02, b'z', b'h', b'h', b'i']
        );
    }

    #[test]
    fn test_multiple_records_concatenate() {
        let message = NdefMessage::new(vec![
            NdefRecord::text("en", "BEGIN:VCARD\n"),
            NdefRecord::new(Tnf::Media, &b"text/plain"[..], &b"FN:Li\n"[..]),
            NdefRecord::text("zh", "END:VCARD"),
        ]);
        let bytes = message.to_bytes();
        // MB on the first, ME on the last, neither in between
        assert_eq!(bytes[0] & 0xC0, 0x80);

        let parsed = NdefMessage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.text(), "BEGIN:VCARD\nFN:Li\nEND:VCARD");
    }

    #[test]
    fn test_empty_message() {
        let message = NdefMessage::from_bytes(&[]).unwrap();
        assert!(message.is_empty());
        assert_eq!(message.text(), "");
        assert!(NdefMessage::default().to_bytes().is_empty());
    }

    #[test]
    fn test_trailing_garbage() {
        let mut bytes = NdefMessage::text_message("en", "x").to_bytes().to_vec();
        bytes.push(0xAA);
        assert!(NdefMessage::from_bytes(&bytes).is_err());
    }
}

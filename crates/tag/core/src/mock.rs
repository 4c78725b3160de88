//! Simulated NTAG21x tag for testing
//!
//! [`MockTag`] keeps the full page map in memory and answers GET_VERSION,
//! READ, WRITE and READ_CNT like the real chip, including the one-time
//! programmable capability container and the NFC counter that increments on
//! the first READ after each power-up.

use bytes::Bytes;

use crate::chip::{NFC_CNT_EN, TagType};
use crate::command::{ACK, NFC_COUNTER_INDEX, PAGE_SIZE, READ_SIZE, opcode};
use crate::transport::{TagTransport, Technology, TransportError};

/// Answer sent for a rejected command
const NAK: u8 = 0x00;

/// Simulated NTAG213/215/216
#[derive(Debug, Clone)]
pub struct MockTag {
    uid: Vec<u8>,
    tag_type: TagType,
    pages: Vec<[u8; PAGE_SIZE]>,
    version: [u8; 8],
    reported_storage_size: Option<u8>,
    missing: Vec<Technology>,
    connected: bool,
    removed: bool,
    powered_up: bool,
    counter: u32,
    connect_count: usize,
    close_count: usize,
    write_count: usize,
}

impl MockTag {
    /// Formatted NTAG213 with an empty NDEF message
    pub fn ntag213(uid: &[u8]) -> Self {
        Self::with_chip(uid, TagType::Ntag213, 0x0F)
    }

    /// Formatted NTAG215 with an empty NDEF message
    pub fn ntag215(uid: &[u8]) -> Self {
        Self::with_chip(uid, TagType::Ntag215, 0x11)
    }

    /// Formatted NTAG216 with an empty NDEF message
    pub fn ntag216(uid: &[u8]) -> Self {
        Self::with_chip(uid, TagType::Ntag216, 0x13)
    }

    fn with_chip(uid: &[u8], tag_type: TagType, storage_size: u8) -> Self {
        let config_page = tag_type.config_page().unwrap_or(0x29) as usize;
        let mut pages = vec![[0u8; PAGE_SIZE]; config_page + 4];

        if let [u0, u1, u2, u3, u4, u5, u6] = *uid {
            pages[0] = [u0, u1, u2, 0x88 ^ u0 ^ u1 ^ u2];
            pages[1] = [u3, u4, u5, u6];
            pages[2] = [u3 ^ u4 ^ u5 ^ u6, 0x48, 0x00, 0x00];
        }
        pages[3] = [0xE1, 0x10, tag_type.capability_size().unwrap_or(0), 0x00];
        pages[4] = [0x03, 0x00, 0xFE, 0x00];
        pages[config_page] = [0x04, 0x00, 0x00, 0xFF];
        pages[config_page + 1] = [0x00, 0x05, 0x00, 0x00];

        Self {
            uid: uid.to_vec(),
            tag_type,
            pages,
            version: [0x00, 0x04, 0x04, 0x02, 0x01, 0x00, storage_size, 0x03],
            reported_storage_size: None,
            missing: Vec::new(),
            connected: false,
            removed: false,
            powered_up: true,
            counter: 0,
            connect_count: 0,
            close_count: 0,
            write_count: 0,
        }
    }

    /// Clear the capability container and data area, as shipped from the factory
    pub fn blank(mut self) -> Self {
        self.pages[3] = [0; PAGE_SIZE];
        self.pages[4] = [0; PAGE_SIZE];
        self
    }

    /// Mark the capability container write protected
    pub fn read_only(mut self) -> Self {
        self.pages[3][3] = 0x0F;
        self
    }

    /// Hide a technology from the reader
    pub fn without(mut self, technology: Technology) -> Self {
        self.missing.push(technology);
        self
    }

    /// Make the reader report a storage size code without GET_VERSION
    pub const fn with_reported_storage_size(mut self, code: u8) -> Self {
        self.reported_storage_size = Some(code);
        self
    }

    /// Take the tag out of the field
    pub fn remove(&mut self) {
        self.removed = true;
        self.connected = false;
    }

    /// Bring the tag (back) into the field, powering it up
    pub fn present(&mut self) {
        self.removed = false;
        self.powered_up = true;
    }

    /// Chip variant being simulated
    pub const fn tag_type(&self) -> TagType {
        self.tag_type
    }

    /// Contents of one page
    pub fn page(&self, page: u8) -> [u8; PAGE_SIZE] {
        self.pages[page as usize]
    }

    /// Current NFC counter value
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Number of successful connects
    pub const fn connect_count(&self) -> usize {
        self.connect_count
    }

    /// Number of closes
    pub const fn close_count(&self) -> usize {
        self.close_count
    }

    /// Number of accepted WRITE commands
    pub const fn write_count(&self) -> usize {
        self.write_count
    }

    fn counter_enabled(&self) -> bool {
        self.tag_type
            .config_page()
            .is_some_and(|page| self.pages[page as usize + 1][0] & NFC_CNT_EN != 0)
    }

    fn read(&mut self, page: u8) -> Bytes {
        let count = self.pages.len();
        let start = page as usize;
        if start >= count {
            return Bytes::from_static(&[NAK]);
        }

        if self.powered_up {
            self.powered_up = false;
            if self.counter_enabled() {
                self.counter = (self.counter + 1) & 0x00FF_FFFF;
            }
        }

        // Reads past the end roll over to page 0
        let mut out = Vec::with_capacity(READ_SIZE);
        for i in 0..READ_SIZE / PAGE_SIZE {
            out.extend_from_slice(&self.pages[(start + i) % count]);
        }
        Bytes::from(out)
    }

    fn write(&mut self, page: u8, data: &[u8]) -> Bytes {
        let index = page as usize;
        if index < 2 || index >= self.pages.len() || data.len() != PAGE_SIZE {
            return Bytes::from_static(&[NAK]);
        }

        let target = &mut self.pages[index];
        for (byte, new) in target.iter_mut().zip(data) {
            // Capability container bits are one-time programmable
            if index == 3 { *byte |= new } else { *byte = *new }
        }
        self.write_count += 1;
        Bytes::from_static(&[ACK])
    }

    fn read_counter(&self, index: u8) -> Bytes {
        if index != NFC_COUNTER_INDEX || !self.counter_enabled() {
            return Bytes::from_static(&[NAK]);
        }
        Bytes::copy_from_slice(&self.counter.to_be_bytes()[1..])
    }
}

impl TagTransport for MockTag {
    fn uid(&self) -> Option<&[u8]> {
        (!self.uid.is_empty()).then_some(self.uid.as_slice())
    }

    fn supports(&self, technology: Technology) -> bool {
        !self.missing.contains(&technology)
    }

    fn reported_storage_size(&self) -> Option<u8> {
        self.reported_storage_size
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.removed {
            return Err(TransportError::TagLost);
        }
        self.connected = true;
        self.connect_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.close_count += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        if self.removed {
            return Err(TransportError::TagLost);
        }
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        match frame {
            [opcode::GET_VERSION] => Ok(Bytes::copy_from_slice(&self.version)),
            [opcode::READ, page] => Ok(self.read(*page)),
            [opcode::WRITE, page, data @ ..] => Ok(self.write(*page, data)),
            [opcode::READ_CNT, index] => Ok(self.read_counter(*index)),
            _ => Err(TransportError::Nak(NAK)),
        }
    }
}

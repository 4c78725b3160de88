//! NTAG21x command set
//!
//! Commands are sent as raw NFC-A frames through an open [`TagConnection`].
//! Framing (CRC, parity) is the reader's job.

use bytes::Bytes;

use crate::transport::{TagConnection, TagTransport, TransportError};

/// Command opcodes
pub mod opcode {
    /// Retrieve product version information
    pub const GET_VERSION: u8 = 0x60;
    /// Read four pages starting at the given address
    pub const READ: u8 = 0x30;
    /// Write one page
    pub const WRITE: u8 = 0xA2;
    /// Read a one-way counter
    pub const READ_CNT: u8 = 0x39;
}

/// Positive acknowledge nibble
pub const ACK: u8 = 0x0A;
/// Bytes per page
pub const PAGE_SIZE: usize = 4;
/// Bytes returned by one READ command
pub const READ_SIZE: usize = 16;
/// Length of a GET_VERSION answer
pub const VERSION_SIZE: usize = 8;
/// Index of the NFC counter addressed by READ_CNT
pub const NFC_COUNTER_INDEX: u8 = 0x02;

/// Decoded GET_VERSION answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo([u8; VERSION_SIZE]);

impl VersionInfo {
    /// Parse a GET_VERSION answer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        let raw: [u8; VERSION_SIZE] = bytes
            .get(..VERSION_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(TransportError::InvalidResponse("GET_VERSION answer too short"))?;
        Ok(Self(raw))
    }

    /// Vendor ID (0x04 for NXP)
    pub const fn vendor(&self) -> u8 {
        self.0[1]
    }

    /// Product type (0x04 for NTAG)
    pub const fn product_type(&self) -> u8 {
        self.0[2]
    }

    /// Storage size code, identifies the chip within the family
    pub const fn storage_size(&self) -> u8 {
        self.0[6]
    }

    /// Raw answer bytes
    pub const fn as_bytes(&self) -> &[u8; VERSION_SIZE] {
        &self.0
    }
}

/// Turn a one byte answer into a NAK error
fn check_nak(response: &[u8]) -> Result<(), TransportError> {
    match response {
        [code] if code & 0x0F != ACK => Err(TransportError::Nak(*code)),
        _ => Ok(()),
    }
}

impl<T: TagTransport + ?Sized> TagConnection<'_, T> {
    /// Issue GET_VERSION
    pub fn get_version(&mut self) -> Result<VersionInfo, TransportError> {
        let response = self.transceive(&[opcode::GET_VERSION])?;
        check_nak(&response)?;
        VersionInfo::from_bytes(&response)
    }

    /// Read four pages (16 bytes) starting at `page`
    pub fn read_pages(&mut self, page: u8) -> Result<[u8; READ_SIZE], TransportError> {
        let response = self.transceive(&[opcode::READ, page])?;
        check_nak(&response)?;
        response
            .get(..READ_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(TransportError::InvalidResponse("READ answer too short"))
    }

    /// Write one page
    pub fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<(), TransportError> {
        let mut frame = [0u8; 2 + PAGE_SIZE];
        frame[0] = opcode::WRITE;
        frame[1] = page;
        frame[2..].copy_from_slice(data);

        // Readers differ in whether they surface the ACK; an empty answer is success
        let response: Bytes = self.transceive(&frame)?;
        check_nak(&response)
    }

    /// Issue READ_CNT for counter `index`, returning the 24-bit value
    ///
    /// The three answer bytes are taken most significant first.
    pub fn read_counter(&mut self, index: u8) -> Result<u32, TransportError> {
        let response = self.transceive(&[opcode::READ_CNT, index])?;
        check_nak(&response)?;
        match response.get(..3) {
            Some(&[b0, b1, b2]) => Ok(u32::from_be_bytes([0, b0, b1, b2])),
            _ => Err(TransportError::InvalidResponse("READ_CNT answer too short")),
        }
    }
}

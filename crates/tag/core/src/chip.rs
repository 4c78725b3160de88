//! NTAG21x chip identification
//!
//! The three chips share one command set and differ in memory size, which
//! moves the configuration pages. Addresses follow the NTAG213/215/216
//! datasheet and should be re-validated against real chips when new
//! silicon revisions appear.

use tracing::debug;

use crate::transport::{TagConnection, TagTransport, Technology};

/// Bit of the ACCESS byte that enables the NFC counter (`NFC_CNT_EN`)
pub const NFC_CNT_EN: u8 = 0x10;

/// Label reported for tags outside the supported family
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Supported tag variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TagType {
    /// NTAG213, 144 bytes user memory
    #[display("NTAG213")]
    Ntag213,
    /// NTAG215, 504 bytes user memory
    #[display("NTAG215")]
    Ntag215,
    /// NTAG216, 888 bytes user memory
    #[display("NTAG216")]
    Ntag216,
    /// Anything else answering on NFC-A
    #[display("Unknown")]
    Unknown,
}

impl TagType {
    /// Map the GET_VERSION storage size byte to a variant
    pub const fn from_storage_size(code: u8) -> Self {
        match code {
            0x0F => Self::Ntag213,
            0x11 => Self::Ntag215,
            0x13 => Self::Ntag216,
            _ => Self::Unknown,
        }
    }

    /// Address of the CFG0 page; the ACCESS byte lives in the page after it
    pub const fn config_page(self) -> Option<u8> {
        match self {
            Self::Ntag213 => Some(0x29),
            Self::Ntag215 => Some(0x83),
            Self::Ntag216 => Some(0xE3),
            Self::Unknown => None,
        }
    }

    /// Size byte written to a blank capability container (data area / 8)
    pub const fn capability_size(self) -> Option<u8> {
        match self {
            Self::Ntag213 => Some(0x12),
            Self::Ntag215 => Some(0x3E),
            Self::Ntag216 => Some(0x6D),
            Self::Unknown => None,
        }
    }

    /// Total number of pages on the chip
    pub const fn page_count(self) -> Option<usize> {
        match self.config_page() {
            // CFG0, CFG1, PWD and PACK close the memory map
            Some(page) => Some(page as usize + 4),
            None => None,
        }
    }

    /// Whether this is one of the supported chips
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Human readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ntag213 => "NTAG213",
            Self::Ntag215 => "NTAG215",
            Self::Ntag216 => "NTAG216",
            Self::Unknown => UNKNOWN_LABEL,
        }
    }
}

/// Identify the chip behind `transport`
///
/// Uses the reader-reported storage size when available and falls back to
/// GET_VERSION. Returns `None` when the tag cannot be queried at all.
pub fn identify<T: TagTransport + ?Sized>(transport: &mut T) -> Option<TagType> {
    if let Some(code) = transport.reported_storage_size() {
        return Some(TagType::from_storage_size(code));
    }

    let mut conn = TagConnection::open(transport, Technology::NfcA)
        .inspect_err(|e| debug!(error = ?e, "Cannot open NfcA for GET_VERSION"))
        .ok()?;
    let version = conn
        .get_version()
        .inspect_err(|e| debug!(error = ?e, "GET_VERSION failed"))
        .ok()?;

    let tag_type = TagType::from_storage_size(version.storage_size());
    debug!(%tag_type, storage_size = version.storage_size(), "Identified tag");
    Some(tag_type)
}

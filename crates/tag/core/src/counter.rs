//! Anti-clone counter control
//!
//! NTAG21x chips carry a 24-bit NFC counter that increments on the first
//! READ after each power-up once `NFC_CNT_EN` is set. A cloned tag cannot
//! reproduce the original's counter sequence.

use tracing::{debug, info, warn};

use crate::chip::{self, NFC_CNT_EN, TagType};
use crate::command::NFC_COUNTER_INDEX;
use crate::transport::{TagConnection, TagTransport, Technology};

/// Counter indices tried in order by [`CounterController::read_counter`]
const COUNTER_INDICES: [u8; 2] = [NFC_COUNTER_INDEX, 0x00];

/// Outcome of [`CounterController::enable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterStatus {
    /// Identified tag variant
    pub tag_type: TagType,
    /// Whether the counter is enabled after the call
    pub enabled: bool,
}

impl CounterStatus {
    const fn disabled(tag_type: TagType) -> Self {
        Self {
            tag_type,
            enabled: false,
        }
    }
}

/// Enables and reads the NTAG21x NFC counter
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterController;

impl CounterController {
    /// Create a new controller
    pub const fn new() -> Self {
        Self
    }

    /// Identify the tag variant, see [`chip::identify`]
    pub fn identify<T: TagTransport + ?Sized>(&self, tag: &mut T) -> Option<TagType> {
        chip::identify(tag)
    }

    /// Turn the NFC counter on
    ///
    /// Idempotent: an already enabled counter is reported without rewriting
    /// the configuration page. Returns `None` when the tag has no NFC-A
    /// technology or does not answer GET_VERSION.
    pub fn enable<T: TagTransport + ?Sized>(&self, tag: &mut T) -> Option<CounterStatus> {
        if !tag.supports(Technology::NfcA) {
            debug!("Tag has no NfcA technology, counter unavailable");
            return None;
        }

        let tag_type = chip::identify(tag)?;
        let Some(config_page) = tag_type.config_page() else {
            debug!(%tag_type, "No counter configuration for tag");
            return Some(CounterStatus::disabled(tag_type));
        };

        let mut conn = match TagConnection::open(tag, Technology::Ultralight) {
            Ok(conn) => conn,
            Err(e) => {
                debug!(error = ?e, "Cannot open Ultralight connection");
                return Some(CounterStatus::disabled(tag_type));
            }
        };

        // READ returns CFG0 followed by CFG1; ACCESS is CFG1 byte 0
        let raw = match conn.read_pages(config_page) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = ?e, page = config_page, "Failed to read configuration pages");
                return Some(CounterStatus::disabled(tag_type));
            }
        };

        let mut access_config = [raw[4], raw[5], raw[6], raw[7]];
        if access_config[0] & NFC_CNT_EN != 0 {
            debug!(%tag_type, "NFC counter already enabled");
            return Some(CounterStatus {
                tag_type,
                enabled: true,
            });
        }

        access_config[0] |= NFC_CNT_EN;
        match conn.write_page(config_page + 1, &access_config) {
            Ok(()) => {
                info!(%tag_type, "NFC counter enabled");
                Some(CounterStatus {
                    tag_type,
                    enabled: true,
                })
            }
            Err(e) => {
                warn!(error = ?e, "Failed to write ACCESS configuration");
                Some(CounterStatus::disabled(tag_type))
            }
        }
    }

    /// Read the NFC counter
    ///
    /// Returns `None` when the tag lacks NFC-A, the counter is disabled or
    /// the tag does not answer.
    pub fn read_counter<T: TagTransport + ?Sized>(&self, tag: &mut T) -> Option<u32> {
        let mut conn = TagConnection::open(tag, Technology::NfcA)
            .inspect_err(|e| debug!(error = ?e, "Cannot open NfcA for READ_CNT"))
            .ok()?;

        for index in COUNTER_INDICES {
            match conn.read_counter(index) {
                Ok(value) => {
                    debug!(index, value, "Read NFC counter");
                    return Some(value);
                }
                Err(e) => debug!(index, error = ?e, "READ_CNT failed"),
            }
        }
        None
    }
}

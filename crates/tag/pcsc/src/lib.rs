//! PC/SC backend for NFC tag transports
//!
//! Contactless PC/SC readers expose a presented tag as a "card". This crate
//! implements [`TagTransport`](nfc_access_tag::TagTransport) on top of such a
//! card, tunnelling raw NFC-A frames through the reader's pseudo-APDUs, and
//! watches readers for tags entering and leaving the field.
//!
//! # Examples
//!
//! ```no_run
//! use nfc_access_pcsc::PcscDeviceManager;
//! use nfc_access_tag::{CounterController, TagTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PcscDeviceManager::new()?;
//! let mut tag = manager.open_first_tag()?;
//! println!("UID: {}", hex::encode_upper(tag.uid().unwrap_or_default()));
//! println!("Counter: {:?}", CounterController::new().read_counter(&mut tag));
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
pub mod event;
mod manager;
mod monitor;
mod reader;
mod transport;
mod util;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use event::TagEvent;
pub use manager::PcscDeviceManager;
pub use monitor::PcscMonitor;
pub use reader::PcscReader;
pub use transport::PcscTagTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};

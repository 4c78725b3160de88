//! Core traits and types for talking to NFC Forum Type 2 tags
//!
//! This crate provides the building blocks used to issue and read access
//! credentials on NXP NTAG21x tags.
//!
//! ## Overview
//!
//! - [`TagTransport`] abstracts a physical tag reachable through some reader
//!   technology; [`TagConnection`] is the scoped guard that pairs every
//!   connect with a close.
//! - [`command`] implements the NTAG21x command set (GET_VERSION, READ,
//!   WRITE, READ_CNT) on top of a connection.
//! - [`ndef`] encodes and decodes NDEF messages and maps them onto Type 2
//!   tag memory.
//! - [`CounterController`] enables and reads the anti-clone NFC counter.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::Bytes;

// Main modules
pub mod chip;
pub mod command;
pub mod counter;
pub mod ndef;
pub mod transport;
pub mod uid;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Core error types
mod error;
pub use error::{Error, Result};

// Re-exports for common types
pub use chip::TagType;
pub use counter::{CounterController, CounterStatus};
pub use ndef::{NdefMessage, NdefRecord};
pub use transport::{TagConnection, TagTransport, Technology, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, CounterController, CounterStatus, Error, NdefMessage, NdefRecord, Result, TagType,
        transport::{TagConnection, TagTransport, Technology, TransportError},
    };
}

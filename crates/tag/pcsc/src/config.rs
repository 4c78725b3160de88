//! Configuration options for the PC/SC backend

use std::time::Duration;

use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};

/// Sharing mode for tag connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the tag
    Exclusive,
    /// Shared access to the tag (default)
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Strategy for choosing the reader to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// A specific reader by name
    Reader(String),
    /// The first reader holding a Type 2 tag
    AnyTag,
    /// The first reader, whatever it holds
    FirstAvailable,
}

/// Configuration options for the PC/SC backend
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Sharing mode for tag connections
    pub share_mode: ShareMode,

    /// Preferred protocols for tag communication
    pub protocols: PcscProtocols,

    /// Longest a single status wait blocks before the monitor rechecks its
    /// stop flag
    pub poll_interval: Duration,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: PcscProtocols::ANY,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: PcscProtocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set the monitor poll interval
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

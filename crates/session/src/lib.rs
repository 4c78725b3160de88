//! Tag session for issuing, upgrading and reading access credentials
//!
//! A [`TagSession`] holds at most one pending request. The next tag
//! presented to the reader consumes it:
//!
//! - a pending [`WriteRequest`] signs and writes a new credential, then
//!   optionally enables the anti-clone counter;
//! - a pending [`UpgradeRequest`] re-signs a credential read earlier and
//!   writes it back;
//! - with nothing pending, the tag is read and its text, counter, door code
//!   and signature status are reported.
//!
//! Each step is published as a [`SessionEvent`] to subscribers.
//! [`SessionWorker`] runs the session on its own thread.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod error;
pub mod event;
mod request;
mod session;
mod worker;

pub use error::{FailureReason, WorkerError};
pub use event::{SessionEvent, TagReadResult, WriteOutcome};
pub use request::{PendingRequest, RequestKind, SessionState, UpgradeRequest, WriteRequest};
pub use session::{DEFAULT_LANGUAGE, SessionOptions, TagSession};
pub use worker::{SessionCommand, SessionWorker};

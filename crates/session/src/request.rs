//! Requests waiting for the next tag

use std::mem;

/// Issue a new credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Holder's full name
    pub name: String,
    /// Holder's phone number
    pub phone: String,
    /// Local part of the holder's email address
    pub email_local: String,
    /// Turn on the anti-clone counter after writing
    pub enable_counter: bool,
}

impl WriteRequest {
    /// Request with the counter enabled
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email_local: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email_local: email_local.into(),
            enable_counter: true,
        }
    }

    /// Set whether the counter should be enabled
    pub const fn with_counter(mut self, enable: bool) -> Self {
        self.enable_counter = enable;
        self
    }
}

/// Re-sign a credential read earlier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// UID the credential was read from
    pub uid: String,
    /// Credential text as read
    pub text: String,
}

impl UpgradeRequest {
    /// Create an upgrade request
    pub fn new(uid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            text: text.into(),
        }
    }
}

/// A request submitted to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    /// Write a new credential
    Write(WriteRequest),
    /// Upgrade an existing credential
    Upgrade(UpgradeRequest),
}

impl PendingRequest {
    /// Kind of the request
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Write(_) => RequestKind::Write,
            Self::Upgrade(_) => RequestKind::Upgrade,
        }
    }
}

impl From<WriteRequest> for PendingRequest {
    fn from(request: WriteRequest) -> Self {
        Self::Write(request)
    }
}

impl From<UpgradeRequest> for PendingRequest {
    fn from(request: UpgradeRequest) -> Self {
        Self::Upgrade(request)
    }
}

/// Kind of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RequestKind {
    /// New credential
    #[display("write")]
    Write,
    /// Re-signed credential
    #[display("upgrade")]
    Upgrade,
}

/// Session state between tag presentations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing pending, the next tag is read
    #[default]
    Idle,
    /// The next tag receives a new credential
    PendingWrite(WriteRequest),
    /// The next tag receives an upgraded credential
    PendingUpgrade(UpgradeRequest),
}

impl SessionState {
    /// Whether a request is pending
    pub const fn is_pending(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Take the pending request, leaving the state idle
    pub(crate) fn take(&mut self) -> Option<PendingRequest> {
        match mem::take(self) {
            Self::Idle => None,
            Self::PendingWrite(request) => Some(PendingRequest::Write(request)),
            Self::PendingUpgrade(request) => Some(PendingRequest::Upgrade(request)),
        }
    }
}

impl From<PendingRequest> for SessionState {
    fn from(request: PendingRequest) -> Self {
        match request {
            PendingRequest::Write(request) => Self::PendingWrite(request),
            PendingRequest::Upgrade(request) => Self::PendingUpgrade(request),
        }
    }
}

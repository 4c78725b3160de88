//! Tag session state machine

use std::sync::Arc;

use nfc_access_credential::{
    CredentialProfile, CredentialSigner, CredentialVerifier, KeyManager, access_code,
};
use nfc_access_tag::{
    CounterController, NdefMessage, TagTransport, TagType, ndef,
    uid::{canonical_hex, uid_hex},
};
use tracing::{debug, info, instrument, warn};

use crate::error::FailureReason;
use crate::event::{
    SessionEvent, SessionEventReceiver, SessionEventSender, TagReadResult, WriteOutcome,
    session_event_channel,
};
use crate::request::{PendingRequest, RequestKind, SessionState, UpgradeRequest, WriteRequest};

/// Default NDEF text language
pub const DEFAULT_LANGUAGE: &str = "zh";

/// Settings for a [`TagSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Language code of written text records
    pub language: String,
    /// Constant credential fields
    pub profile: CredentialProfile,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            profile: CredentialProfile::default(),
        }
    }
}

/// Reacts to tag presentations according to the pending request
///
/// At most one request is pending. A new submission replaces the previous
/// one and the next presented tag consumes it, whatever the outcome. Without
/// a pending request a presented tag is read.
#[derive(Debug)]
pub struct TagSession {
    state: SessionState,
    keys: Arc<KeyManager>,
    signer: CredentialSigner,
    verifier: CredentialVerifier,
    counter: CounterController,
    language: String,
    subscribers: Vec<SessionEventSender>,
}

impl TagSession {
    /// Create a session with default options
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self::with_options(keys, SessionOptions::default())
    }

    /// Create a session
    pub fn with_options(keys: Arc<KeyManager>, options: SessionOptions) -> Self {
        Self {
            state: SessionState::Idle,
            signer: CredentialSigner::with_profile(Arc::clone(&keys), options.profile),
            verifier: CredentialVerifier::new(Arc::clone(&keys)),
            keys,
            counter: CounterController::new(),
            language: options.language,
            subscribers: Vec::new(),
        }
    }

    /// Current state
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> SessionEventReceiver {
        let (sender, receiver) = session_event_channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Forward every event emitted from now on to `sender`
    pub fn add_subscriber(&mut self, sender: SessionEventSender) {
        self.subscribers.push(sender);
    }

    /// Make `request` the pending request, replacing any other
    pub fn submit(&mut self, request: impl Into<PendingRequest>) -> SessionEvent {
        let request = request.into();
        let kind = request.kind();
        if self.state.is_pending() {
            debug!(%kind, "Replacing pending request");
        }
        self.state = request.into();
        info!(%kind, "Waiting for tag");
        self.emit(SessionEvent::Waiting(kind))
    }

    /// Drop the pending request without touching a tag
    pub fn cancel(&mut self) -> bool {
        self.state.take().is_some()
    }

    /// Handle a tag entering the field
    ///
    /// Returns the emitted event, `None` when an idle read failed.
    #[instrument(level = "debug", skip_all)]
    pub fn on_tag_present<T: TagTransport + ?Sized>(&mut self, tag: &mut T) -> Option<SessionEvent> {
        let uid = tag.uid().map(uid_hex).unwrap_or_default();
        let event = match self.state.take() {
            Some(PendingRequest::Write(request)) => Some(self.write(tag, &uid, &request)),
            Some(PendingRequest::Upgrade(request)) => Some(self.upgrade(tag, &uid, &request)),
            None => self.read(tag, &uid).map(SessionEvent::Read),
        };
        event.map(|event| self.emit(event))
    }

    fn write<T: TagTransport + ?Sized>(
        &self,
        tag: &mut T,
        uid: &str,
        request: &WriteRequest,
    ) -> SessionEvent {
        let credential = self.signer.build_credential(
            &request.name,
            &request.phone,
            &request.email_local,
            uid,
        );
        self.finish(
            RequestKind::Write,
            tag,
            uid,
            credential,
            request.enable_counter,
        )
    }

    fn upgrade<T: TagTransport + ?Sized>(
        &self,
        tag: &mut T,
        uid: &str,
        request: &UpgradeRequest,
    ) -> SessionEvent {
        if !request.uid.is_empty() && canonical_hex(&request.uid) != uid {
            warn!(read = %request.uid, presented = %uid, "Upgrading a different tag than was read");
        }
        let credential = self.signer.upgrade(&request.text, uid);
        self.finish(RequestKind::Upgrade, tag, uid, credential, false)
    }

    /// Write `credential` and report the outcome
    fn finish<T: TagTransport + ?Sized>(
        &self,
        kind: RequestKind,
        tag: &mut T,
        uid: &str,
        credential: Option<String>,
        enable_counter: bool,
    ) -> SessionEvent {
        match self.store(tag, uid, credential, enable_counter) {
            Ok((tag_type, counter_enabled)) => {
                info!(%kind, uid, tag_type, counter_enabled, "Credential written");
                SessionEvent::Success(WriteOutcome {
                    kind,
                    uid: uid.to_string(),
                    tag_type: tag_type.to_string(),
                    counter_enabled,
                })
            }
            Err(reason) => {
                warn!(%kind, uid, %reason, "Credential not written");
                SessionEvent::Failure {
                    kind,
                    uid: uid.to_string(),
                    reason,
                }
            }
        }
    }

    /// Checks run in failure precedence order: key, tag, write
    fn store<T: TagTransport + ?Sized>(
        &self,
        tag: &mut T,
        uid: &str,
        credential: Option<String>,
        enable_counter: bool,
    ) -> Result<(&'static str, bool), FailureReason> {
        let credential = credential.ok_or(FailureReason::KeyUnavailable)?;
        if uid.is_empty() {
            return Err(FailureReason::TagLost);
        }

        let tag_type = self.counter.identify(tag).unwrap_or(TagType::Unknown);
        let message = NdefMessage::text_message(&self.language, &credential);
        ndef::write_message(tag, &message, tag_type)?;

        if !enable_counter {
            return Ok((tag_type.label(), false));
        }
        Ok(self.counter.enable(tag).map_or((tag_type.label(), false), |status| {
            (status.tag_type.label(), status.enabled)
        }))
    }

    fn read<T: TagTransport + ?Sized>(&self, tag: &mut T, uid: &str) -> Option<TagReadResult> {
        let message = ndef::read_message(tag)
            .inspect_err(|e| debug!(uid, error = %e, "Read skipped"))
            .ok()?;
        let text = message.text();
        let counter = self.counter.read_counter(tag);
        let tag_type = self.counter.identify(tag).unwrap_or(TagType::Unknown);
        let authenticity = self
            .keys
            .load_public()
            .map(|_| self.verifier.inspect(uid, &text));

        debug!(uid, ?counter, %tag_type, ?authenticity, "Read tag");
        Some(TagReadResult {
            uid: uid.to_string(),
            text,
            counter,
            tag_type: tag_type.label().to_string(),
            access_code: access_code::derive(uid),
            authenticity,
        })
    }

    fn emit(&mut self, event: SessionEvent) -> SessionEvent {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        event
    }
}

#[cfg(test)]
mod tests {
    use nfc_access_credential::Authenticity;
    use nfc_access_tag::Technology;
    use nfc_access_tag::mock::MockTag;

    use super::*;

    const UID: [u8; 7] = [0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80];

    fn session() -> TagSession {
        let keys = Arc::new(KeyManager::in_memory());
        keys.generate().unwrap();
        TagSession::new(keys)
    }

    #[test]
    fn test_submit_emits_waiting() {
        let mut session = session();
        let events = session.subscribe();
        let event = session.submit(WriteRequest::new("A", "1", "a"));
        assert_eq!(event, SessionEvent::Waiting(RequestKind::Write));
        assert_eq!(events.try_recv().unwrap(), event);
        assert!(matches!(session.state(), SessionState::PendingWrite(_)));
    }

    #[test]
    fn test_last_submission_wins() {
        let mut session = session();
        session.submit(WriteRequest::new("A", "1", "a"));
        session.submit(UpgradeRequest::new("04", "FN:A\n"));
        assert!(matches!(session.state(), SessionState::PendingUpgrade(_)));
        session.submit(WriteRequest::new("B", "2", "b"));
        assert!(matches!(session.state(), SessionState::PendingWrite(r) if r.name == "B"));
        assert!(session.cancel());
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(!session.cancel());
    }

    #[test]
    fn test_write_then_read() {
        let mut session = session();
        let mut tag = MockTag::ntag215(&UID);

        session.submit(WriteRequest::new("张三", "13800000000", "john"));
        let Some(SessionEvent::Success(outcome)) = session.on_tag_present(&mut tag) else {
            panic!("expected success");
        };
        assert_eq!(outcome.uid, "04A1B2C3D4E580");
        assert_eq!(outcome.tag_type, "NTAG215");
        assert!(outcome.counter_enabled);
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(!tag.is_connected());

        tag.present();
        let Some(SessionEvent::Read(read)) = session.on_tag_present(&mut tag) else {
            panic!("expected a read");
        };
        assert_eq!(read.uid, "04A1B2C3D4E580");
        assert!(read.text.contains("FN:张三\n"));
        assert!(read.text.contains("NOTE:UID=04A1B2C3D4E580;"));
        assert_eq!(read.counter, Some(1));
        assert_eq!(read.tag_type, "NTAG215");
        assert_eq!(read.access_code.as_deref(), Some("3285509504"));
        assert_eq!(read.authenticity, Some(Authenticity::Genuine));
    }

    #[test]
    fn test_credential_too_large() {
        let mut session = session();
        let mut tag = MockTag::ntag213(&UID);
        session.submit(WriteRequest::new("张三", "13800000000", "john"));
        let event = session.on_tag_present(&mut tag).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Failure { reason: FailureReason::Capacity { available: 144, .. }, .. }
        ));
        assert_eq!(tag.write_count(), 0);
    }

    #[test]
    fn test_write_without_counter() {
        let mut session = session();
        let mut tag = MockTag::ntag215(&UID);
        session.submit(WriteRequest::new("A", "1", "a").with_counter(false));
        let Some(SessionEvent::Success(outcome)) = session.on_tag_present(&mut tag) else {
            panic!("expected success");
        };
        assert_eq!(outcome.tag_type, "NTAG215");
        assert!(!outcome.counter_enabled);
    }

    #[test]
    fn test_missing_key_reported_first() {
        let mut session = TagSession::new(Arc::new(KeyManager::in_memory()));
        let mut tag = MockTag::ntag213(&UID);
        tag.remove();

        session.submit(WriteRequest::new("A", "1", "a"));
        let event = session.on_tag_present(&mut tag).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Failure { reason: FailureReason::KeyUnavailable, .. }
        ));
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_missing_uid_reported_before_write() {
        let mut session = session();
        let mut tag = MockTag::ntag215(&[]);

        session.submit(WriteRequest::new("A", "1", "a"));
        match session.on_tag_present(&mut tag) {
            Some(SessionEvent::Failure { reason, uid, .. }) => {
                assert_eq!(reason, FailureReason::TagLost);
                assert!(uid.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(tag.write_count(), 0);
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_removed_tag() {
        let mut session = session();
        let mut tag = MockTag::ntag213(&UID);
        tag.remove();

        session.submit(WriteRequest::new("A", "1", "a"));
        let event = session.on_tag_present(&mut tag).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Failure { reason: FailureReason::TagLost, .. }
        ));

        // Consumed: the next presentation is a read, which fails silently
        assert_eq!(session.on_tag_present(&mut tag), None);
    }

    #[test]
    fn test_read_only_tag_untouched() {
        let mut session = session();
        let mut tag = MockTag::ntag213(&UID).read_only();
        let before = tag.page(4);

        session.submit(WriteRequest::new("A", "1", "a"));
        let event = session.on_tag_present(&mut tag).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Failure { reason: FailureReason::ReadOnly, .. }
        ));
        assert_eq!(tag.page(4), before);
        assert_eq!(tag.write_count(), 0);
    }

    #[test]
    fn test_unsupported_format() {
        let mut session = session();
        let mut tag = MockTag::ntag213(&UID).without(Technology::Ndef);
        session.submit(WriteRequest::new("A", "1", "a"));
        let event = session.on_tag_present(&mut tag).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Failure { reason: FailureReason::UnsupportedFormat, .. }
        ));
    }

    #[test]
    fn test_upgrade_binds_presented_uid() {
        let mut session = session();
        let mut tag = MockTag::ntag216(&UID);
        let legacy = "BEGIN:VCARD\nFN:A\nTEL:1\nEND:VCARD\n";

        session.submit(UpgradeRequest::new("04FFFFFFFFFFFF", legacy));
        let Some(SessionEvent::Success(outcome)) = session.on_tag_present(&mut tag) else {
            panic!("expected success");
        };
        assert_eq!(outcome.kind, RequestKind::Upgrade);
        assert!(!outcome.counter_enabled);

        tag.present();
        let Some(SessionEvent::Read(read)) = session.on_tag_present(&mut tag) else {
            panic!("expected a read");
        };
        assert!(read.text.starts_with("BEGIN:VCARD\nFN:A\nTEL:1\nNOTE:UID=04A1B2C3D4E580;"));
        assert_eq!(read.authenticity, Some(Authenticity::Genuine));
        assert_eq!(read.counter, None);
    }

    #[test]
    fn test_read_legacy_tag() {
        let mut session = session();
        let mut tag = MockTag::ntag213(&UID);
        let message = NdefMessage::text_message("en", "FN:Legacy\nTEL:1\n");
        ndef::write_message(&mut tag, &message, TagType::Ntag213).unwrap();

        let Some(SessionEvent::Read(read)) = session.on_tag_present(&mut tag) else {
            panic!("expected a read");
        };
        assert_eq!(read.text, "FN:Legacy\nTEL:1\n");
        assert_eq!(read.authenticity, Some(Authenticity::Unsigned));
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut session = session();
        let kept = session.subscribe();
        drop(session.subscribe());
        session.submit(WriteRequest::new("A", "1", "a"));
        assert_eq!(session.subscribers.len(), 1);
        assert_eq!(kept.len(), 1);
    }
}

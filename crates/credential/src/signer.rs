//! Credential signing

use std::sync::Arc;

use ed25519_dalek::Signer;
use nfc_access_tag::uid::{canonical_hex, uid_bytes};
use tracing::{debug, warn};

use crate::keys::KeyManager;
use crate::note::{NOTE_PREFIX, Note, is_note_line};

/// Default organization written to new credentials
pub const DEFAULT_ORGANIZATION: &str = "COMCORN";
/// Default domain appended to the email local part
pub const DEFAULT_EMAIL_DOMAIN: &str = "comcorn.cn";

/// Constant fields of the credentials this installation issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialProfile {
    /// Value of the `ORG` line
    pub organization: String,
    /// Domain of the `EMAIL` line
    pub email_domain: String,
}

impl Default for CredentialProfile {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_string(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl CredentialProfile {
    /// Full email address for `local`
    ///
    /// A value that already contains `@` is used as is.
    pub fn email(&self, local: &str) -> String {
        let local = local.trim();
        if local.contains('@') {
            local.to_string()
        } else {
            format!("{local}@{}", self.email_domain)
        }
    }
}

/// Builds signed notes and credentials
///
/// Every operation needs the private key and returns `None` when it cannot be
/// opened, so a missing key and a corrupted key look the same to callers.
#[derive(Debug, Clone)]
pub struct CredentialSigner {
    keys: Arc<KeyManager>,
    profile: CredentialProfile,
}

impl CredentialSigner {
    /// Create a signer with the default profile
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self::with_profile(keys, CredentialProfile::default())
    }

    /// Create a signer with a custom profile
    pub const fn with_profile(keys: Arc<KeyManager>, profile: CredentialProfile) -> Self {
        Self { keys, profile }
    }

    /// Profile used for new credentials
    pub const fn profile(&self) -> &CredentialProfile {
        &self.profile
    }

    /// Note binding a signature to `uid`
    ///
    /// The UID is canonicalized and its raw bytes, not the hex text, are
    /// signed.
    pub fn build_note(&self, uid: &str) -> Option<String> {
        let Some(key) = self.keys.signing_key() else {
            debug!("No signing key configured");
            return None;
        };

        let uid = canonical_hex(uid);
        let signature = key.sign(&uid_bytes(&uid));
        debug!(uid = %uid, "Signed UID");
        Some(Note::new(uid, signature.to_bytes().to_vec()).to_string())
    }

    /// Complete credential for a new holder
    pub fn build_credential(
        &self,
        name: &str,
        phone: &str,
        email_local: &str,
        uid: &str,
    ) -> Option<String> {
        let note = self.build_note(uid)?;
        let lines = [
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!("FN:{}", name.trim()),
            format!("ORG:{}", self.profile.organization),
            format!("EMAIL:{}", self.profile.email(email_local)),
            format!("TEL:{}", phone.trim()),
            format!("{NOTE_PREFIX}{note}"),
            "END:VCARD".to_string(),
        ];

        let mut credential = lines.join("\n");
        credential.push('\n');
        Some(credential)
    }

    /// Replace every note in `existing` with a fresh one for `uid`
    ///
    /// All other lines are kept, along with the line ending style and the
    /// trailing newline.
    pub fn upgrade(&self, existing: &str, uid: &str) -> Option<String> {
        let note = self.build_note(uid)?;
        if existing.trim().is_empty() {
            warn!(uid = %uid, "Upgrading an empty credential");
        }
        Some(replace_note(existing, &note))
    }
}

/// Strip note lines from `text` and insert `note` before `END:VCARD`
fn replace_note(text: &str, note: &str) -> String {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing = text.ends_with('\n');

    let note_line = format!("{NOTE_PREFIX}{note}");
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !is_note_line(line.trim_start()))
        .collect();

    let end = lines
        .iter()
        .rposition(|line| line.trim().eq_ignore_ascii_case("END:VCARD"))
        .unwrap_or(lines.len());
    lines.insert(end, &note_line);

    let mut out = lines.join(newline);
    if trailing {
        out.push_str(newline);
    }
    out
}

//! Offline credential verification

use std::fmt;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, Signature, VerifyingKey};
use nfc_access_tag::uid::{canonical_hex, uid_bytes};
use tracing::debug;

use crate::error::KeyError;
use crate::keys::KeyManager;
use crate::note::{ALGORITHM, NOTE_PREFIX, field, is_note_line, parse_note};

/// Outcome of inspecting a credential read from a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authenticity {
    /// No note at all, a legacy credential
    Unsigned,
    /// The note is signed by the configured key for this UID
    Genuine,
    /// A note is present but does not verify
    Forged,
}

impl Authenticity {
    /// Short operator-facing label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Genuine => "genuine",
            Self::Forged => "forged",
        }
    }
}

impl fmt::Display for Authenticity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
enum KeySource {
    Managed(Arc<KeyManager>),
    Pinned(VerifyingKey),
}

/// Checks signed notes against the UID that was physically read
///
/// Verification never fails loudly: every problem, from a missing field to a
/// bad signature, yields `false`.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    source: KeySource,
}

impl CredentialVerifier {
    /// Verify with the public key held by `keys`
    pub const fn new(keys: Arc<KeyManager>) -> Self {
        Self {
            source: KeySource::Managed(keys),
        }
    }

    /// Verify with a fixed public key
    pub const fn with_public_key(key: VerifyingKey) -> Self {
        Self {
            source: KeySource::Pinned(key),
        }
    }

    /// Verify with a fixed base64 public key
    pub fn from_public_base64(public: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(public.trim())?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            KeyError::invalid_length("public", PUBLIC_KEY_LENGTH, bytes.len())
        })?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self::with_public_key(key))
    }

    fn verifying_key(&self) -> Option<VerifyingKey> {
        match &self.source {
            KeySource::Managed(keys) => keys.verifying_key(),
            KeySource::Pinned(key) => Some(*key),
        }
    }

    /// Whether `note` carries a valid signature for `observed_uid`
    pub fn verify(&self, observed_uid: &str, note: &str) -> bool {
        match self.check(observed_uid, note) {
            Ok(()) => true,
            Err(reason) => {
                debug!(uid = %observed_uid, reason, "Note rejected");
                false
            }
        }
    }

    fn check(&self, observed_uid: &str, note: &str) -> Result<(), &'static str> {
        let fields = parse_note(note);
        let signature = fields.get(field::SIG).ok_or("missing signature")?;
        let uid = fields.get(field::UID).ok_or("missing UID")?;
        if fields
            .get(field::ALG)
            .is_some_and(|alg| !alg.eq_ignore_ascii_case(ALGORITHM))
        {
            return Err("unsupported algorithm");
        }

        let observed = canonical_hex(observed_uid);
        if observed.is_empty() {
            return Err("empty UID");
        }
        if canonical_hex(uid) != observed {
            return Err("UID mismatch");
        }

        let key = self.verifying_key().ok_or("no public key")?;
        let signature = STANDARD
            .decode(signature)
            .map_err(|_| "signature is not base64")?;
        let signature =
            Signature::from_slice(&signature).map_err(|_| "signature has the wrong length")?;

        key.verify_strict(&uid_bytes(&observed), &signature)
            .map_err(|_| "bad signature")
    }

    /// Classify a full credential text read from the tag with `observed_uid`
    pub fn inspect(&self, observed_uid: &str, text: &str) -> Authenticity {
        match find_note(text) {
            None => Authenticity::Unsigned,
            Some(note) if self.verify(observed_uid, note) => Authenticity::Genuine,
            Some(_) => Authenticity::Forged,
        }
    }
}

/// Body of the first note line in `text`, if any
pub fn find_note(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| is_note_line(line))
        .map(|line| line[NOTE_PREFIX.len()..].trim())
        .filter(|body| !body.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::CredentialSigner;

    const UID: &str = "04A1B2C3D4E580";

    fn setup() -> (CredentialSigner, CredentialVerifier) {
        let keys = Arc::new(KeyManager::in_memory());
        keys.generate().unwrap();
        (
            CredentialSigner::new(keys.clone()),
            CredentialVerifier::new(keys),
        )
    }

    #[test]
    fn test_round_trip() {
        let (signer, verifier) = setup();
        for uid in [UID, "04a1b2c3", "00", "04:A1:B2:C3:D4:E5:80"] {
            let note = signer.build_note(uid).unwrap();
            assert!(verifier.verify(uid, &note), "{uid}");
        }
        let note = signer.build_note(UID).unwrap();
        assert!(verifier.verify(&UID.to_lowercase(), &note));
    }

    #[test]
    fn test_tamper_rejection() {
        let (signer, verifier) = setup();
        let note = signer.build_note(UID).unwrap();
        let signature = STANDARD.decode(&parse_note(&note)["SIG"]).unwrap();

        for bit in [0, 7, 100, 511] {
            let mut flipped = signature.clone();
            flipped[bit / 8] ^= 1 << (bit % 8);
            let forged = format!("UID={UID};SIG={};ALG=ED25519;VER=1", STANDARD.encode(flipped));
            assert!(!verifier.verify(UID, &forged), "bit {bit}");
        }
    }

    #[test]
    fn test_uid_binding() {
        let (signer, verifier) = setup();
        let note = signer.build_note(UID).unwrap();
        assert!(!verifier.verify("04A1B2C3D4E581", &note));

        // Rewriting the UID field does not help a cloned tag
        let replayed = note.replace(UID, "04A1B2C3D4E581");
        assert!(!verifier.verify("04A1B2C3D4E581", &replayed));
    }

    #[test]
    fn test_rejects_incomplete_notes() {
        let (signer, verifier) = setup();
        let note = signer.build_note(UID).unwrap();
        let sig = &parse_note(&note)["SIG"];

        assert!(!verifier.verify(UID, &format!("UID={UID}")));
        assert!(!verifier.verify(UID, &format!("SIG={sig}")));
        assert!(!verifier.verify(UID, &format!("UID={UID};SIG={sig};ALG=RSA")));
        assert!(!verifier.verify(UID, &format!("UID={UID};SIG=not*base64")));
        assert!(!verifier.verify(UID, "garbage;;UID=AB"));
        assert!(!verifier.verify("", &note));
        // Legacy notes without ALG/VER still verify
        assert!(verifier.verify(UID, &format!("SIG={sig};UID={UID}")));
    }

    #[test]
    fn test_no_public_key() {
        let (signer, _) = setup();
        let note = signer.build_note(UID).unwrap();
        let verifier = CredentialVerifier::new(Arc::new(KeyManager::in_memory()));
        assert!(!verifier.verify(UID, &note));
    }

    #[test]
    fn test_other_key_rejected() {
        let (signer, _) = setup();
        let note = signer.build_note(UID).unwrap();
        let (_, other) = setup();
        assert!(!other.verify(UID, &note));
    }

    #[test]
    fn test_pinned_public_key() {
        let keys = Arc::new(KeyManager::in_memory());
        let pair = keys.generate().unwrap();
        let note = CredentialSigner::new(keys).build_note(UID).unwrap();

        let verifier = CredentialVerifier::from_public_base64(&pair.public_base64()).unwrap();
        assert!(verifier.verify(UID, &note));
        assert!(matches!(
            CredentialVerifier::from_public_base64("AAAA"),
            Err(KeyError::InvalidLength { .. })
        ));
        assert!(matches!(
            CredentialVerifier::from_public_base64("***"),
            Err(KeyError::Encoding(_))
        ));
    }

    #[test]
    fn test_inspect() {
        let (signer, verifier) = setup();
        let credential = signer.build_credential("A", "1", "a", UID).unwrap();

        assert_eq!(verifier.inspect(UID, &credential), Authenticity::Genuine);
        assert_eq!(verifier.inspect("04", &credential), Authenticity::Forged);
        assert_eq!(verifier.inspect(UID, "FN:A\nTEL:1\n"), Authenticity::Unsigned);
        assert_eq!(verifier.inspect(UID, "FN:A\nNOTE:\n"), Authenticity::Unsigned);
        assert_eq!(verifier.inspect(UID, "FN:A\nNOTE:junk\n"), Authenticity::Forged);
    }

    #[test]
    fn test_find_note() {
        assert_eq!(find_note("FN:A\r\nnote: UID=04 \r\n"), Some("UID=04"));
        assert_eq!(find_note("FN:A\n"), None);
        assert_eq!(find_note(""), None);
    }
}

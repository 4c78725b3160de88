//! Signing key pair management
//!
//! The public key is stored in the clear. The private key is sealed by the
//! [`DeviceKeystore`] before it reaches the [`BlobStore`] and is only opened
//! for the duration of a signing operation.

mod keystore;
mod store;

use std::fmt;
use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SigningKey, VerifyingKey};
use rand::RngCore;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub use keystore::{DEVICE_KEY_LENGTH, DeviceKeystore, NONCE_LENGTH, SoftwareKeystore};
pub use store::{BlobStore, FileStore, MemoryStore};

use crate::error::KeyError;

/// Entry holding `base64(nonce || sealed private key)`
pub const PRIVATE_ENTRY: &str = "private_enc";
/// Entry holding the base64 public key
pub const PUBLIC_ENTRY: &str = "public";
/// File name of the software device key inside a data directory
pub const DEVICE_KEY_FILE: &str = "device.key";

/// Associated data binding sealed blobs to their purpose
const PRIVATE_KEY_AD: &[u8] = b"nfc-access:ed25519-private-key";

/// A freshly generated or imported key pair
pub struct KeyPair {
    /// Compressed Edwards point
    pub public: [u8; PUBLIC_KEY_LENGTH],
    /// Secret seed
    pub private: Zeroizing<[u8; SECRET_KEY_LENGTH]>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &STANDARD.encode(self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Public key as standard base64
    pub fn public_base64(&self) -> String {
        STANDARD.encode(self.public)
    }

    /// Private key as standard base64
    pub fn private_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.private.as_slice()))
    }
}

/// Owner of the signing key pair
///
/// Every "load" operation degrades to `None`: missing entries, unreadable
/// storage, an invalidated device key and corrupted ciphertext all look like
/// "no key configured" to callers.
#[derive(Debug)]
pub struct KeyManager {
    store: Box<dyn BlobStore>,
    keystore: Box<dyn DeviceKeystore>,
}

impl KeyManager {
    /// Create a manager over the given storage and device keystore
    pub fn new(store: impl BlobStore + 'static, keystore: impl DeviceKeystore + 'static) -> Self {
        Self {
            store: Box::new(store),
            keystore: Box::new(keystore),
        }
    }

    /// Manager that forgets everything on drop
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), SoftwareKeystore::ephemeral())
    }

    /// File-backed manager rooted at `data_dir`
    ///
    /// Entries go to `data_dir/keys/`, the device key to `data_dir/device.key`.
    pub fn open(data_dir: &Path) -> Result<Self, KeyError> {
        let store = FileStore::open(data_dir.join("keys"))?;
        let keystore = SoftwareKeystore::open(data_dir.join(DEVICE_KEY_FILE))?;
        Ok(Self::new(store, keystore))
    }

    /// Generate a fresh key pair, replacing any existing one
    pub fn generate(&self) -> Result<KeyPair, KeyError> {
        let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        rand::rng().fill_bytes(seed.as_mut_slice());
        let signing_key = SigningKey::from_bytes(&seed);

        let pair = KeyPair {
            public: signing_key.verifying_key().to_bytes(),
            private: seed,
        };
        self.persist(&pair)?;
        info!(public = %pair.public_base64(), "Generated signing key pair");
        Ok(pair)
    }

    /// Replace the key pair with imported key material
    ///
    /// Both halves must be present, have the Ed25519 sizes, and belong
    /// together.
    pub fn import(&self, public: &[u8], private: &[u8]) -> Result<(), KeyError> {
        if public.is_empty() || private.is_empty() {
            return Err(KeyError::EmptyKey);
        }

        let public: [u8; PUBLIC_KEY_LENGTH] = public
            .try_into()
            .map_err(|_| KeyError::invalid_length("public", PUBLIC_KEY_LENGTH, public.len()))?;
        let private: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
            Zeroizing::new(private.try_into().map_err(|_| {
                KeyError::invalid_length("private", SECRET_KEY_LENGTH, private.len())
            })?);

        if SigningKey::from_bytes(&private).verifying_key().to_bytes() != public {
            return Err(KeyError::KeyMismatch);
        }

        self.persist(&KeyPair { public, private })?;
        info!("Imported signing key pair");
        Ok(())
    }

    /// [`import`](Self::import) from standard base64 strings
    pub fn import_base64(&self, public: &str, private: &str) -> Result<(), KeyError> {
        let public = STANDARD.decode(public.trim())?;
        let private = Zeroizing::new(STANDARD.decode(private.trim())?);
        self.import(&public, &private)
    }

    /// Erase both halves of the key pair
    pub fn clear(&self) -> Result<(), KeyError> {
        self.store.remove(PRIVATE_ENTRY)?;
        self.store.remove(PUBLIC_ENTRY)?;
        info!("Cleared signing key pair");
        Ok(())
    }

    /// Whether both entries exist (their usability is not checked)
    pub fn has_key_pair(&self) -> bool {
        let present = |name| {
            self.store
                .get(name)
                .ok()
                .flatten()
                .is_some_and(|value| !value.is_empty())
        };
        present(PRIVATE_ENTRY) && present(PUBLIC_ENTRY)
    }

    /// Decrypt the private key seed
    pub fn load_private(&self) -> Option<Zeroizing<[u8; SECRET_KEY_LENGTH]>> {
        let encoded = self.entry(PRIVATE_ENTRY)?;
        let sealed = STANDARD
            .decode(encoded)
            .inspect_err(|e| warn!(error = %e, "Stored private key is not base64"))
            .ok()?;
        let plain = Zeroizing::new(
            self.keystore
                .open(PRIVATE_KEY_AD, &sealed)
                .inspect_err(|e| warn!(error = %e, "Cannot open stored private key"))
                .ok()?,
        );

        match plain.as_slice().try_into() {
            Ok(seed) => Some(Zeroizing::new(seed)),
            Err(_) => {
                warn!(len = plain.len(), "Stored private key has the wrong length");
                None
            }
        }
    }

    /// Stored public key
    pub fn load_public(&self) -> Option<[u8; PUBLIC_KEY_LENGTH]> {
        let encoded = self.entry(PUBLIC_ENTRY)?;
        let bytes = STANDARD
            .decode(encoded)
            .inspect_err(|e| warn!(error = %e, "Stored public key is not base64"))
            .ok()?;
        bytes.as_slice().try_into().ok()
    }

    /// Stored public key as base64
    pub fn public_key_base64(&self) -> Option<String> {
        self.load_public().map(|public| STANDARD.encode(public))
    }

    /// Both halves of the stored pair, for backup onto another device
    pub fn export(&self) -> Option<KeyPair> {
        Some(KeyPair {
            private: self.load_private()?,
            public: self.load_public()?,
        })
    }

    /// Signing key, only while the private key can be opened
    pub(crate) fn signing_key(&self) -> Option<SigningKey> {
        self.load_private().map(|seed| SigningKey::from_bytes(&seed))
    }

    /// Verifying key built from the stored public key
    pub(crate) fn verifying_key(&self) -> Option<VerifyingKey> {
        let public = self.load_public()?;
        VerifyingKey::from_bytes(&public)
            .inspect_err(|e| warn!(error = %e, "Stored public key is not a curve point"))
            .ok()
    }

    fn entry(&self, name: &str) -> Option<String> {
        match self.store.get(name) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => {
                debug!(entry = name, "Key entry absent");
                None
            }
            Err(e) => {
                warn!(entry = name, error = %e, "Cannot read key entry");
                None
            }
        }
    }

    /// Store both halves, restoring the previous private entry if the public
    /// one cannot be written
    fn persist(&self, pair: &KeyPair) -> Result<(), KeyError> {
        let sealed = self.keystore.seal(PRIVATE_KEY_AD, pair.private.as_slice())?;
        let previous = self.store.get(PRIVATE_ENTRY)?;
        self.store.put(PRIVATE_ENTRY, &STANDARD.encode(sealed))?;

        if let Err(e) = self.store.put(PUBLIC_ENTRY, &pair.public_base64()) {
            let restored = match previous {
                Some(previous) => self.store.put(PRIVATE_ENTRY, &previous),
                None => self.store.remove(PRIVATE_ENTRY),
            };
            if let Err(restore) = restored {
                warn!(error = %restore, "Cannot restore previous private key entry");
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Keystore handle shared with the test so it can be invalidated
    #[derive(Debug, Clone)]
    struct SharedKeystore(Arc<SoftwareKeystore>);

    impl DeviceKeystore for SharedKeystore {
        fn seal(&self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
            self.0.seal(ad, plaintext)
        }

        fn open(&self, ad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, KeyError> {
            self.0.open(ad, sealed)
        }
    }

    /// Blob store handle shared with the test so entries can be inspected
    #[derive(Debug, Clone, Default)]
    struct SharedStore(Arc<MemoryStore>);

    impl BlobStore for SharedStore {
        fn get(&self, name: &str) -> Result<Option<String>, KeyError> {
            self.0.get(name)
        }

        fn put(&self, name: &str, value: &str) -> Result<(), KeyError> {
            self.0.put(name, value)
        }

        fn remove(&self, name: &str) -> Result<(), KeyError> {
            self.0.remove(name)
        }
    }

    #[test]
    fn test_generate_and_load() {
        let keys = KeyManager::in_memory();
        assert!(!keys.has_key_pair());
        assert!(keys.load_private().is_none());

        let pair = keys.generate().unwrap();
        assert!(keys.has_key_pair());
        assert_eq!(*keys.load_private().unwrap(), *pair.private);
        assert_eq!(keys.load_public().unwrap(), pair.public);
        assert_eq!(keys.public_key_base64().unwrap(), pair.public_base64());
    }

    #[test]
    fn test_private_key_never_stored_plain() {
        let store = SharedStore::default();
        let keys = KeyManager::new(store.clone(), SoftwareKeystore::ephemeral());
        let pair = keys.generate().unwrap();

        let stored = STANDARD.decode(store.get(PRIVATE_ENTRY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), NONCE_LENGTH + SECRET_KEY_LENGTH + 16);
        assert!(
            !stored
                .windows(SECRET_KEY_LENGTH)
                .any(|w| w == pair.private.as_slice())
        );
    }

    #[test]
    fn test_regenerate_uses_fresh_nonce() {
        let store = SharedStore::default();
        let keys = KeyManager::new(store.clone(), SoftwareKeystore::ephemeral());
        let pair = keys.generate().unwrap();
        let first = store.get(PRIVATE_ENTRY).unwrap();
        keys.import(&pair.public, pair.private.as_slice()).unwrap();
        assert_ne!(store.get(PRIVATE_ENTRY).unwrap(), first);
    }

    #[test]
    fn test_invalidated_keystore_reads_as_no_key() {
        let keystore = SharedKeystore(Arc::new(SoftwareKeystore::ephemeral()));
        let keys = KeyManager::new(MemoryStore::new(), keystore.clone());
        keys.generate().unwrap();

        keystore.0.invalidate().unwrap();
        assert!(keys.load_private().is_none());
        assert!(keys.signing_key().is_none());
        // The public half is unaffected
        assert!(keys.load_public().is_some());
        assert!(keys.has_key_pair());
    }

    #[test]
    fn test_corrupted_ciphertext_reads_as_no_key() {
        let store = SharedStore::default();
        let keys = KeyManager::new(store.clone(), SoftwareKeystore::ephemeral());
        keys.generate().unwrap();

        store.put(PRIVATE_ENTRY, "not base64!").unwrap();
        assert!(keys.load_private().is_none());

        store.put(PRIVATE_ENTRY, &STANDARD.encode([0u8; 40])).unwrap();
        assert!(keys.load_private().is_none());

        store.put(PUBLIC_ENTRY, &STANDARD.encode([1u8; 5])).unwrap();
        assert!(keys.load_public().is_none());
    }

    #[test]
    fn test_import_validation() {
        let keys = KeyManager::in_memory();
        let source = KeyManager::in_memory().generate().unwrap();

        assert!(matches!(keys.import(&[], &[1]), Err(KeyError::EmptyKey)));
        assert!(matches!(keys.import(&[1], &[]), Err(KeyError::EmptyKey)));
        assert!(matches!(
            keys.import(&[1; 31], source.private.as_slice()),
            Err(KeyError::InvalidLength { kind: "public", .. })
        ));
        assert!(matches!(
            keys.import(&source.public, &[1; 33]),
            Err(KeyError::InvalidLength { kind: "private", .. })
        ));
        assert!(matches!(
            keys.import(&[7; 32], source.private.as_slice()),
            Err(KeyError::KeyMismatch)
        ));
        assert!(!keys.has_key_pair());

        keys.import_base64(&source.public_base64(), &source.private_base64())
            .unwrap();
        assert_eq!(keys.load_public().unwrap(), source.public);
        assert_eq!(*keys.load_private().unwrap(), *source.private);
        assert!(matches!(
            keys.import_base64("%%%", "AAAA"),
            Err(KeyError::Encoding(_))
        ));
    }

    #[test]
    fn test_clear() {
        let keys = KeyManager::in_memory();
        keys.generate().unwrap();
        keys.clear().unwrap();
        assert!(!keys.has_key_pair());
        assert!(keys.load_private().is_none());
        assert!(keys.load_public().is_none());
        assert!(keys.export().is_none());
        keys.clear().unwrap();
    }

    #[test]
    fn test_export_moves_to_another_device() {
        let source = KeyManager::in_memory();
        let pair = source.generate().unwrap();
        let exported = source.export().unwrap();
        assert_eq!(exported.public, pair.public);

        let target = KeyManager::in_memory();
        target
            .import_base64(&exported.public_base64(), &exported.private_base64())
            .unwrap();
        assert_eq!(*target.load_private().unwrap(), *pair.private);
    }

    #[test]
    fn test_file_backed_manager() {
        let dir = tempfile::tempdir().unwrap();
        let public = {
            let keys = KeyManager::open(dir.path()).unwrap();
            keys.generate().unwrap().public
        };

        let keys = KeyManager::open(dir.path()).unwrap();
        assert_eq!(keys.load_public(), Some(public));
        assert!(keys.load_private().is_some());
        assert!(dir.path().join(DEVICE_KEY_FILE).exists());
    }

    /// Store that refuses to write the public entry
    #[derive(Debug, Clone, Default)]
    struct ReadOnlyPublic(SharedStore);

    impl BlobStore for ReadOnlyPublic {
        fn get(&self, name: &str) -> Result<Option<String>, KeyError> {
            self.0.get(name)
        }

        fn put(&self, name: &str, value: &str) -> Result<(), KeyError> {
            if name == PUBLIC_ENTRY {
                return Err(std::io::Error::other("disk full").into());
            }
            self.0.put(name, value)
        }

        fn remove(&self, name: &str) -> Result<(), KeyError> {
            self.0.remove(name)
        }
    }

    #[test]
    fn test_failed_public_write_keeps_previous_pair() {
        let inner = SharedStore::default();
        let keystore = SharedKeystore(Arc::new(SoftwareKeystore::ephemeral()));
        let pair = KeyManager::new(inner.clone(), keystore.clone())
            .generate()
            .unwrap();
        let sealed = inner.get(PRIVATE_ENTRY).unwrap();

        let keys = KeyManager::new(ReadOnlyPublic(inner.clone()), keystore);
        assert!(matches!(keys.generate(), Err(KeyError::Storage(_))));
        assert_eq!(inner.get(PRIVATE_ENTRY).unwrap(), sealed);
        assert_eq!(*keys.load_private().unwrap(), *pair.private);
        assert_eq!(keys.load_public().unwrap(), pair.public);

        // Without a previous pair nothing is left behind
        let empty = KeyManager::new(ReadOnlyPublic::default(), SoftwareKeystore::ephemeral());
        assert!(empty.generate().is_err());
        assert!(!empty.has_key_pair());
        assert!(empty.load_private().is_none());
    }

    #[test]
    fn test_unusable_device_key_file_keeps_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let public = KeyManager::open(dir.path()).unwrap().generate().unwrap().public;
        std::fs::write(dir.path().join(DEVICE_KEY_FILE), [0u8; 7]).unwrap();

        let keys = KeyManager::open(dir.path()).unwrap();
        assert!(keys.load_private().is_none());
        assert!(keys.signing_key().is_none());
        assert_eq!(keys.load_public(), Some(public));
        assert!(keys.verifying_key().is_some());
    }

    #[test]
    fn test_debug_redacts_private() {
        let pair = KeyManager::in_memory().generate().unwrap();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(pair.private_base64().as_str()));
    }
}

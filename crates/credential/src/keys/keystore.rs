//! Device-bound sealing of key material
//!
//! A [`DeviceKeystore`] encrypts data under a key that never leaves the
//! device. Hardware-backed implementations keep that key non-exportable; the
//! [`SoftwareKeystore`] shipped here keeps it in an owner-only file.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use parking_lot::RwLock;
use rand::RngCore;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::store::write_private;
use crate::error::KeyError;

/// AES-256-GCM nonce length
pub const NONCE_LENGTH: usize = 12;
/// AES-256 key length
pub const DEVICE_KEY_LENGTH: usize = 32;

/// Device-protected authenticated encryption
///
/// Sealed output is self-contained: it carries whatever the implementation
/// needs besides the device key (nonce, tag) to open it again.
pub trait DeviceKeystore: Send + Sync + fmt::Debug {
    /// Encrypt `plaintext`, binding `associated_data` into the tag
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyError>;

    /// Decrypt output of [`seal`](Self::seal) made with the same associated data
    fn open(&self, associated_data: &[u8], sealed: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// AES-256-GCM keystore with a software-held device key
///
/// Sealed blobs are `nonce || ciphertext || tag` with a fresh random nonce
/// per call.
pub struct SoftwareKeystore {
    key: RwLock<Option<Zeroizing<[u8; DEVICE_KEY_LENGTH]>>>,
    path: Option<PathBuf>,
}

impl fmt::Debug for SoftwareKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKeystore")
            .field("key", &"[REDACTED]")
            .field("path", &self.path)
            .finish()
    }
}

impl SoftwareKeystore {
    /// Keystore whose key lives only in memory
    pub fn ephemeral() -> Self {
        Self {
            key: RwLock::new(Some(random_key())),
            path: None,
        }
    }

    /// Keystore backed by a key file, created on first use
    ///
    /// A key file of the wrong length is treated like an invalidated key.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KeyError> {
        let path = path.into();
        let key = match fs::read(&path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                match <[u8; DEVICE_KEY_LENGTH]>::try_from(bytes.as_slice()) {
                    Ok(key) => Some(Zeroizing::new(key)),
                    Err(_) => {
                        warn!(
                            path = %path.display(),
                            len = bytes.len(),
                            "Ignoring device key of wrong length"
                        );
                        None
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            key: RwLock::new(key),
            path: Some(path),
        })
    }

    /// Path of the key file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Destroy the device key
    ///
    /// Everything sealed so far becomes unrecoverable. The next
    /// [`seal`](DeviceKeystore::seal) creates a fresh key.
    pub fn invalidate(&self) -> Result<(), KeyError> {
        *self.key.write() = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        warn!("Device key invalidated");
        Ok(())
    }

    /// Current key, creating and persisting one if none exists
    fn ensure_key(&self) -> Result<Zeroizing<[u8; DEVICE_KEY_LENGTH]>, KeyError> {
        if let Some(key) = self.key.read().as_ref() {
            return Ok(key.clone());
        }

        let mut slot = self.key.write();
        if let Some(key) = slot.as_ref() {
            return Ok(key.clone());
        }
        let key = random_key();
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_private(path, key.as_slice())?;
        }
        info!("Created device key");
        *slot = Some(key.clone());
        Ok(key)
    }

    fn cipher(key: &[u8; DEVICE_KEY_LENGTH]) -> Result<Aes256Gcm, KeyError> {
        Aes256Gcm::new_from_slice(key).map_err(|_| KeyError::KeystoreUnavailable)
    }
}

impl DeviceKeystore for SoftwareKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key = self.ensure_key()?;
        let cipher = Self::cipher(&key)?;

        let mut nonce = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| KeyError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, associated_data: &[u8], sealed: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key = self.key.read().clone().ok_or(KeyError::KeystoreUnavailable)?;
        if sealed.len() <= NONCE_LENGTH {
            debug!(len = sealed.len(), "Sealed blob too short");
            return Err(KeyError::Open);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        Self::cipher(&key)?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| KeyError::Open)
    }
}

fn random_key() -> Zeroizing<[u8; DEVICE_KEY_LENGTH]> {
    let mut key = Zeroizing::new([0u8; DEVICE_KEY_LENGTH]);
    rand::rng().fill_bytes(key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    const AD: &[u8] = b"nfc-access:test";

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let keystore = SoftwareKeystore::ephemeral();
        let a = keystore.seal(AD, b"secret").unwrap();
        let b = keystore.seal(AD, b"secret").unwrap();
        assert_ne!(a[..NONCE_LENGTH], b[..NONCE_LENGTH]);
        assert_eq!(keystore.open(AD, &a).unwrap(), b"secret");
        assert_eq!(keystore.open(AD, &b).unwrap(), b"secret");
    }

    #[test]
    fn test_open_rejects_tampering() {
        let keystore = SoftwareKeystore::ephemeral();
        let mut sealed = keystore.seal(AD, b"secret").unwrap();
        assert!(matches!(keystore.open(b"other", &sealed), Err(KeyError::Open)));
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(keystore.open(AD, &sealed), Err(KeyError::Open)));
        assert!(matches!(keystore.open(AD, &[0u8; 4]), Err(KeyError::Open)));
    }

    #[test]
    fn test_invalidate() {
        let keystore = SoftwareKeystore::ephemeral();
        let sealed = keystore.seal(AD, b"secret").unwrap();
        keystore.invalidate().unwrap();
        assert!(matches!(keystore.open(AD, &sealed), Err(KeyError::KeystoreUnavailable)));

        // A new key is created, old blobs stay unreadable
        let fresh = keystore.seal(AD, b"other").unwrap();
        assert_eq!(keystore.open(AD, &fresh).unwrap(), b"other");
        assert!(matches!(keystore.open(AD, &sealed), Err(KeyError::Open)));
    }

    #[test]
    fn test_file_backed_key_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");

        let sealed = SoftwareKeystore::open(&path).unwrap().seal(AD, b"secret").unwrap();
        assert!(path.exists());

        let reopened = SoftwareKeystore::open(&path).unwrap();
        assert_eq!(reopened.open(AD, &sealed).unwrap(), b"secret");

        reopened.invalidate().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");
        let sealed = SoftwareKeystore::open(&path).unwrap().seal(AD, b"secret").unwrap();
        fs::write(&path, [0u8; 7]).unwrap();

        let keystore = SoftwareKeystore::open(&path).unwrap();
        assert!(matches!(keystore.open(AD, &sealed), Err(KeyError::KeystoreUnavailable)));

        // Sealing replaces the broken file with a fresh key
        let fresh = keystore.seal(AD, b"other").unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), DEVICE_KEY_LENGTH);
        assert_eq!(keystore.open(AD, &fresh).unwrap(), b"other");
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", SoftwareKeystore::ephemeral());
        assert!(rendered.contains("[REDACTED]"));
    }
}

//! Signed access credentials for NFC tags
//!
//! A credential is a vCard whose `NOTE:` line carries an Ed25519 signature
//! over the raw UID of the tag it was written to:
//!
//! ```text
//! NOTE:UID=04A1B2C3D4E580;SIG=<base64>;ALG=ED25519;VER=1
//! ```
//!
//! Copying the credential onto another tag breaks the binding because the
//! verifier checks the signature against the UID it physically read.
//!
//! - [`KeyManager`] keeps the signing key pair, the private half sealed by a
//!   [`DeviceKeystore`].
//! - [`CredentialSigner`] builds notes and credentials and upgrades legacy
//!   ones.
//! - [`CredentialVerifier`] checks a note against an observed UID.
//! - [`access_code`] derives the legacy door code from a UID.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod access_code;
pub mod contact;
mod error;
pub mod keys;
pub mod note;
mod signer;
mod verifier;

pub use contact::ContactCard;
pub use error::KeyError;
pub use keys::{
    BlobStore, DeviceKeystore, FileStore, KeyManager, KeyPair, MemoryStore, SoftwareKeystore,
};
pub use note::{Note, parse_note};
pub use signer::{CredentialProfile, CredentialSigner};
pub use verifier::{Authenticity, CredentialVerifier, find_note};

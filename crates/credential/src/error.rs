//! Key management errors

/// Errors raised while storing, sealing or importing keys
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The blob store could not be read or written
    #[error("Key storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The device keystore holds no usable key
    #[error("Device keystore unavailable")]
    KeystoreUnavailable,

    /// Sealing with the device key failed
    #[error("Failed to seal key material")]
    Seal,

    /// Authentication of sealed key material failed
    #[error("Failed to open sealed key material")]
    Open,

    /// Stored or imported key material is empty
    #[error("Key material is empty")]
    EmptyKey,

    /// Key material has the wrong size
    #[error("Invalid {kind} key length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Which half of the pair
        kind: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// The public key does not belong to the private key
    #[error("Public key does not match private key")]
    KeyMismatch,

    /// The public key is not a valid curve point
    #[error("Public key is not a valid Ed25519 point")]
    InvalidPublicKey,

    /// Stored or imported text is not valid base64
    #[error("Invalid base64 encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

impl KeyError {
    /// Create a length error
    pub const fn invalid_length(kind: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            kind,
            expected,
            actual,
        }
    }
}

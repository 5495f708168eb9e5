//! Cryptographic error types for `prasword-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (invalid parameters).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure or malformed sealed data.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed: ciphertext tampered or wrong key.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Stored text is not valid base64 or the plaintext is not UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The OS random number generator failed.
    #[error("random source error: {0}")]
    Random(String),

    /// Password generation failure (invalid parameters).
    #[error("password generation error: {0}")]
    PasswordGeneration(String),
}

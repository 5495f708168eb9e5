//! `prasword-crypto-core`: cryptographic primitives for prasword.
//!
//! Key derivation (PBKDF2-HMAC-SHA256), per-field authenticated encryption
//! (AES-256-GCM) and zeroizing key containers. No I/O, no async.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod cipher;
pub mod kdf;

pub mod password;

pub use cipher::{FieldCipher, SealedData};
pub use error::CryptoError;
pub use kdf::{derive_key, generate_salt, KdfParams, DEFAULT_ITERATIONS, SALT_LEN};
pub use memory::SecretBytes;
pub use password::{generate_random_password, CharsetConfig, DEFAULT_PASSWORD_LENGTH};

//! AES-256-GCM field encryption.
//!
//! This module provides:
//! - [`SealedData`]: nonce + ciphertext + tag container
//! - [`encrypt`] / [`decrypt`]: raw authenticated encryption over bytes
//! - [`FieldCipher`]: a key-bound text cipher used for individual columns
//!
//! Stored text format: URL-safe padded base64 of
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! The empty string maps to the empty string in both directions, so absent
//! optional fields carry no encryption overhead.

use std::fmt;

use data_encoding::BASE64URL;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid serialized length: nonce + empty ciphertext + tag.
const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// SealedData
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container: nonce + ciphertext + tag.
///
/// The nonce is random per encryption call and travels with the
/// ciphertext. Any modification to nonce, ciphertext or tag makes
/// decryption fail.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug)]
pub struct SealedData {
    /// 96-bit random nonce, unique per encryption.
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted data (same length as the plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize to wire format: `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from wire format: `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the input is shorter than
    /// 28 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SEALED_LEN {
            return Err(CryptoError::Encryption(format!(
                "sealed data too short: {} bytes (minimum {MIN_SEALED_LEN})",
                bytes.len()
            )));
        }

        let (nonce_part, rest) = bytes.split_at(NONCE_LEN);
        let ct_len = rest
            .len()
            .checked_sub(TAG_LEN)
            .ok_or_else(|| CryptoError::Encryption("sealed data length underflow".into()))?;
        let (ct_part, tag_part) = rest.split_at(ct_len);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_part);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(tag_part);

        Ok(Self {
            nonce,
            ciphertext: ct_part.to_vec(),
            tag,
        })
    }
}

// ---------------------------------------------------------------------------
// Raw AEAD
// ---------------------------------------------------------------------------

fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` with AES-256-GCM under a random 96-bit nonce.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the key is not 32 bytes or the
/// seal operation fails, [`CryptoError::Random`] if no nonce can be drawn.
pub fn encrypt(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| CryptoError::Random(format!("nonce generation failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = sealing_key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate [`SealedData`].
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the key is not 32 bytes and
/// [`CryptoError::Decryption`] if authentication fails (tampered data,
/// wrong key or wrong AAD).
pub fn decrypt(sealed: &SealedData, key: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let opening_key = aead_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(sealed.nonce);

    let mut ct_tag = Vec::with_capacity(sealed.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&sealed.ciphertext);
    ct_tag.extend_from_slice(&sealed.tag);

    let result = opening_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut ct_tag)
        .map(|plaintext| plaintext.to_vec())
        .map_err(|_| CryptoError::Decryption);
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// FieldCipher
// ---------------------------------------------------------------------------

/// Text cipher bound to one derived key.
///
/// Every call to [`encrypt`](Self::encrypt) draws a fresh nonce, so the
/// same plaintext never produces the same stored text twice.
pub struct FieldCipher {
    key: SecretBytes<KEY_LEN>,
    aad: &'static [u8],
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCipher(***)")
    }
}

impl FieldCipher {
    /// Bind a cipher to `key`. `aad` is a domain-separation tag that must
    /// match between encryption and decryption.
    #[must_use]
    pub const fn new(key: SecretBytes<KEY_LEN>, aad: &'static [u8]) -> Self {
        Self { key, aad }
    }

    /// Encrypt a text field. The empty string is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if the underlying AEAD seal fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let sealed = encrypt(plaintext.as_bytes(), self.key.expose(), self.aad)?;
        Ok(BASE64URL.encode(&sealed.to_bytes()))
    }

    /// Decrypt a text field produced by [`encrypt`](Self::encrypt).
    /// The empty string is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Encoding`] for invalid base64 or non-UTF-8 plaintext
    /// - [`CryptoError::Encryption`] for truncated input
    /// - [`CryptoError::Decryption`] for a wrong key or tampered data
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        let raw = BASE64URL
            .decode(ciphertext.as_bytes())
            .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))?;
        let sealed = SealedData::from_bytes(&raw)?;
        let plaintext = decrypt(&sealed, self.key.expose(), self.aad)?;
        String::from_utf8(plaintext).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CryptoError::Encoding("plaintext is not valid UTF-8".into())
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

//! PBKDF2-HMAC-SHA256 key derivation.
//!
//! This module provides:
//! - [`derive_key`]: derive a 256-bit key from a password + salt
//! - [`generate_salt`]: fresh 16-byte salt from the OS CSPRNG
//! - [`KdfParams`]: iteration count, persisted next to the salt
//!
//! Derivation is deterministic: the same password, salt and iteration
//! count always yield the same key. Stores rely on this to re-derive the
//! key on every connect.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::cipher::KEY_LEN;
use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// Length of a freshly generated salt in bytes.
pub const SALT_LEN: usize = 16;

/// Iteration count used when nothing else is recorded.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// PBKDF2 parameter set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 rounds.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive a 256-bit key from a password and salt.
///
/// Any password is accepted, including the empty one. Strength checks
/// belong to the caller.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the salt is shorter than
/// [`SALT_LEN`] bytes or the iteration count is zero.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    if salt.len() < SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {SALT_LEN})",
            salt.len()
        )));
    }
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be at least 1".into(),
        ));
    }

    let mut output = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, params.iterations, &mut output);

    let key = SecretBytes::new(output);
    output.zeroize();
    Ok(key)
}

/// Generate a random [`SALT_LEN`]-byte salt.
///
/// # Errors
///
/// Returns [`CryptoError::Random`] if the CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::Random(format!("CSPRNG fill failed: {e}")))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams { iterations: 10 };

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn derived_key_opens_a_field_cipher() {
        let key = derive_key(b"hunter2", &[7u8; SALT_LEN], &FAST).unwrap();
        assert_eq!(key.expose().len(), KEY_LEN);

        let cipher = crate::cipher::FieldCipher::new(key, b"kdf-test");
        let stored = cipher.encrypt("Bank").unwrap();
        assert_eq!(cipher.decrypt(&stored).unwrap(), "Bank");
    }

    #[test]
    fn default_params_use_100k_iterations() {
        assert_eq!(KdfParams::default().iterations, 100_000);
    }

    #[test]
    fn derive_matches_known_vector() {
        // PBKDF2-HMAC-SHA256, c = 4096, first 32 bytes of the 40-byte vector.
        let key = derive_key(
            b"passwordPASSWORDpassword",
            b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
            &KdfParams { iterations: 4096 },
        )
        .unwrap();
        assert_eq!(
            hex(key.expose()),
            "348c89dbcbd32b2f32d814b8116e84cf2b17347ebc1800181c4e2a1fb8dd53e1"
        );
    }

    #[test]
    fn derive_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"hunter2", &salt, &FAST).unwrap();
        let b = derive_key(b"hunter2", &salt, &FAST).unwrap();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn different_salts_give_different_keys() {
        let a = derive_key(b"hunter2", &[1u8; SALT_LEN], &FAST).unwrap();
        let b = derive_key(b"hunter2", &[2u8; SALT_LEN], &FAST).unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn empty_password_is_accepted() {
        assert!(derive_key(b"", &[0u8; SALT_LEN], &FAST).is_ok());
    }

    #[test]
    fn short_salt_is_rejected() {
        let err = derive_key(b"pw", &[0u8; 8], &FAST).unwrap_err();
        assert!(err.to_string().contains("salt too short"));
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let result = derive_key(b"pw", &[0u8; SALT_LEN], &KdfParams { iterations: 0 });
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn generated_salts_are_unique() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }
}

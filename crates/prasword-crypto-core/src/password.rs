//! Random password generation for new entries.
//!
//! All randomness comes from `OsRng`.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::CryptoError;

/// Minimum allowed password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum allowed password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Default password length.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

/// Which character sets a generated password draws from.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetConfig {
    /// Include uppercase letters (A-Z).
    pub uppercase: bool,
    /// Include lowercase letters (a-z).
    pub lowercase: bool,
    /// Include digits (0-9).
    pub digits: bool,
    /// Include symbols (`!@#$%^&*`).
    pub symbols: bool,
}

impl Default for CharsetConfig {
    fn default() -> Self {
        Self {
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

/// Generate a random password of `length` characters.
///
/// At least one character from each enabled charset is included; the
/// rest are drawn from the combined pool and the result is shuffled.
///
/// # Errors
///
/// Returns [`CryptoError::PasswordGeneration`] if `length` is outside
/// [`MIN_PASSWORD_LENGTH`]..=[`MAX_PASSWORD_LENGTH`] or no charset is enabled.
pub fn generate_random_password(
    length: usize,
    charsets: &CharsetConfig,
) -> Result<String, CryptoError> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(CryptoError::PasswordGeneration(format!(
            "length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }

    let enabled: Vec<&[u8]> = [
        (charsets.uppercase, UPPERCASE),
        (charsets.lowercase, LOWERCASE),
        (charsets.digits, DIGITS),
        (charsets.symbols, SYMBOLS),
    ]
    .into_iter()
    .filter_map(|(on, set)| on.then_some(set))
    .collect();

    if enabled.is_empty() {
        return Err(CryptoError::PasswordGeneration(
            "at least one charset must be enabled".to_string(),
        ));
    }

    let mut rng = OsRng;
    let pool: Vec<u8> = enabled.concat();
    let mut chars: Vec<u8> = enabled
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();
    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    Ok(chars.into_iter().map(char::from).collect())
}

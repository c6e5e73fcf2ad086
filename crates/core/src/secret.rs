//! Random opaque secrets for sessions and other one-off identifiers.
//!
//! Characters are drawn from the operating system CSPRNG with rejection
//! sampling, so every symbol of the chosen alphabet is equally likely. An
//! entropy failure is reported as [`SecretError::RandomSource`]; there is no
//! fallback to a weaker generator.

use rand::rngs::OsRng;
use rand::TryRngCore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Broad alphabet: alphanumerics plus punctuation (88 symbols).
pub const BROAD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890!@#$%^&*()_+-=[]{}|;:,.<>?";

/// URL-safe alphabet: alphanumerics plus the RFC 3986 unreserved marks (66 symbols).
pub const URL_SAFE_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890-_.~";

/// Length of the opaque secret stored in every session row.
pub const SESSION_SECRET_LENGTH: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The underlying entropy source failed.
    #[error("Random source failure: {0}")]
    RandomSource(String),
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate `length` random characters from the OS random source.
///
/// `url_safe` selects [`URL_SAFE_ALPHABET`]; otherwise [`BROAD_ALPHABET`].
pub fn generate_secret(length: usize, url_safe: bool) -> Result<String, SecretError> {
    generate_secret_with(&mut OsRng, length, url_safe)
}

/// Generate `length` random characters using the supplied fallible RNG.
pub fn generate_secret_with<R>(
    rng: &mut R,
    length: usize,
    url_safe: bool,
) -> Result<String, SecretError>
where
    R: TryRngCore + ?Sized,
{
    let alphabet = if url_safe {
        URL_SAFE_ALPHABET
    } else {
        BROAD_ALPHABET
    };

    let mut out = String::with_capacity(length);
    for _ in 0..length {
        let index = uniform_index(rng, alphabet.len() as u32)?;
        out.push(char::from(alphabet[index as usize]));
    }
    Ok(out)
}

/// Draw an index in `0..n` without modulo bias.
fn uniform_index<R>(rng: &mut R, n: u32) -> Result<u32, SecretError>
where
    R: TryRngCore + ?Sized,
{
    // 2^32 mod n; values above `u32::MAX - rem` would skew the distribution.
    let rem = (u32::MAX % n + 1) % n;
    let limit = u32::MAX - rem;
    loop {
        let x = rng
            .try_next_u32()
            .map_err(|e| SecretError::RandomSource(e.to_string()))?;
        if x <= limit {
            return Ok(x % n);
        }
    }
}

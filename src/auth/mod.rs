//! Account credential digests
//!
//! Passwords are stored as a hex HMAC-SHA256 keyed by a random per-account
//! salt. The salt itself is kept base64 encoded next to the digest.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Authentication error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Passwords must be at least {} characters.", MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("Stored credentials are corrupt")]
    CorruptRecord,
}

/// Generate a fresh base64 salt
pub fn generate_salt<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a password for storage
pub fn hash_password(password: &str, salt: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    let mac = keyed_mac(password, salt)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a login attempt against a stored digest
pub fn verify_password(password: &str, salt: &str, digest_hex: &str) -> Result<(), AuthError> {
    let expected = hex::decode(digest_hex).map_err(|_| AuthError::CorruptRecord)?;
    keyed_mac(password, salt)?
        .verify_slice(&expected)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn keyed_mac(password: &str, salt: &str) -> Result<HmacSha256, AuthError> {
    let key = URL_SAFE_NO_PAD
        .decode(salt)
        .map_err(|_| AuthError::CorruptRecord)?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| AuthError::CorruptRecord)?;
    mac.update(password.as_bytes());
    Ok(mac)
}

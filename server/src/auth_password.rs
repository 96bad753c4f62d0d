//! Password hashing and API token generation.
//!
//! Password hashes are stored in the form `pbkdf2_sha256$<iterations>$<salt>$<hash>` with
//! base64-encoded salt and hash, so the parameters of existing hashes stay valid when the
//! default iteration count is raised later.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::SecureRandom;
use ring::{digest, pbkdf2, rand};
use std::num::NonZeroU32;

const PBKDF2_ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const PBKDF2_ITERATIONS: u32 = 390_000;
const SALT_LEN: usize = 16;
const API_TOKEN_LEN: usize = 20;

/// Hash a plain text password for storing it in the user database.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let rng = rand::SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| PasswordError::RandomSourceFailed)?;

    let mut hash = [0u8; digest::SHA256_OUTPUT_LEN];
    pbkdf2::derive(
        PBKDF2_ALGORITHM,
        NonZeroU32::new(PBKDF2_ITERATIONS).unwrap(),
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "pbkdf2_sha256${}${}${}",
        PBKDF2_ITERATIONS,
        BASE64.encode(salt),
        BASE64.encode(hash)
    ))
}

/// Check a plain text password against a stored hash string, as created by [hash_password].
///
/// Returns `Ok(false)` for a wrong password and `Err(_)` for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let mut parts = stored_hash.split('$');
    if parts.next() != Some("pbkdf2_sha256") {
        return Err(PasswordError::UnknownHashFormat);
    }
    let iterations: u32 = parts
        .next()
        .and_then(|i| i.parse().ok())
        .and_then(|i| if i > 0 { Some(i) } else { None })
        .ok_or(PasswordError::UnknownHashFormat)?;
    let salt = parts
        .next()
        .and_then(|s| BASE64.decode(s).ok())
        .ok_or(PasswordError::UnknownHashFormat)?;
    let hash = parts
        .next()
        .and_then(|s| BASE64.decode(s).ok())
        .ok_or(PasswordError::UnknownHashFormat)?;

    Ok(pbkdf2::verify(
        PBKDF2_ALGORITHM,
        NonZeroU32::new(iterations).unwrap(),
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok())
}

/// Generate a new random API token (hex-encoded, 40 characters).
pub fn generate_api_token() -> Result<String, PasswordError> {
    let rng = rand::SystemRandom::new();
    let mut bytes = [0u8; API_TOKEN_LEN];
    rng.fill(&mut bytes)
        .map_err(|_| PasswordError::RandomSourceFailed)?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

#[derive(Debug)]
pub enum PasswordError {
    /// The stored hash string does not follow the expected `pbkdf2_sha256$...` format
    UnknownHashFormat,
    /// The system's secure random source failed
    RandomSourceFailed,
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::UnknownHashFormat => f.write_str("Unknown password hash format"),
            PasswordError::RandomSourceFailed => f.write_str("Secure random source failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("pbkdf2_sha256$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(verify_password("x", "md5$whatever").is_err());
        assert!(verify_password("x", "pbkdf2_sha256$notanumber$AAAA$AAAA").is_err());
    }

    #[test]
    fn test_api_token_shape() {
        let token = generate_api_token().unwrap();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_api_token().unwrap());
    }
}

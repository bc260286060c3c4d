//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible HMAC signing secrets and cheap bcrypt hashes.
//! All fixtures are deterministic based on seed values.

use auth_service::crypto::{SigningKey, VerificationKey};
use base64::engine::general_purpose;
use base64::Engine;
use common::secret::SecretString;
use thiserror::Error;

/// bcrypt cost used for test fixtures (the library minimum, fast).
pub const TEST_BCRYPT_COST: u32 = 4;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Deterministic 32-byte signing secret.
///
/// The same seed always produces the same secret.
///
/// # Example
/// ```rust,ignore
/// assert_eq!(test_signing_secret(1), test_signing_secret(1));
/// assert_ne!(test_signing_secret(1), test_signing_secret(2));
/// ```
pub fn test_signing_secret(seed: u8) -> Vec<u8> {
    (0..32u8)
        .map(|i| seed.wrapping_mul(i.wrapping_add(1)).wrapping_add(i))
        .collect()
}

/// Base64 form of [`test_signing_secret`], as `AUTH_JWT_SECRET` expects it.
pub fn test_signing_secret_base64(seed: u8) -> String {
    general_purpose::STANDARD.encode(test_signing_secret(seed))
}

/// Signing key over [`test_signing_secret`].
pub fn test_signing_key(seed: u8, kid: Option<&str>) -> Result<SigningKey, FixtureError> {
    SigningKey::new(&test_signing_secret(seed), kid.map(str::to_string))
        .map_err(|e| FixtureError::Crypto(format!("Failed to build test signing key: {}", e)))
}

/// Verification key over [`test_signing_secret`].
pub fn test_verification_key(seed: u8, kid: Option<&str>) -> Result<VerificationKey, FixtureError> {
    VerificationKey::new(&test_signing_secret(seed), kid.map(str::to_string))
        .map_err(|e| FixtureError::Crypto(format!("Failed to build test verification key: {}", e)))
}

/// bcrypt hash of `password` at [`TEST_BCRYPT_COST`].
pub fn test_password_hash(password: &str) -> Result<SecretString, FixtureError> {
    bcrypt::hash(password, TEST_BCRYPT_COST)
        .map(SecretString::from)
        .map_err(|e| FixtureError::Crypto(format!("Failed to hash test password: {}", e)))
}

//! Observability for the token service
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and log an explicit
//! allow-list of fields. Fields fall into three groups:
//! - **SAFE**: logged in plaintext (outcomes, error categories, role names)
//! - **HASHED**: SHA-256 prefix for correlation (usernames)
//! - **NEVER**: must never appear in logs (passwords, hashes, whole tokens, keys)
//!
//! Tokens may appear only as [`common::jwt::token_prefix`].

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for usernames, which need correlation across log entries but should
/// not be stored in plaintext.
///
/// # Privacy
///
/// This is NOT cryptographically secure for secrets - it's a one-way hash
/// for correlation purposes only.
pub fn hash_for_correlation(value: &str) -> String {
    let result = Sha256::digest(value.as_bytes());
    // First 4 bytes (8 hex chars) - enough for correlation, limits reversibility
    hex::encode(result.get(..4).unwrap_or_default())
}

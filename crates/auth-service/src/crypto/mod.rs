//! Claims codec and password hashing.
//!
//! This is the only module that touches cryptographic primitives. Tokens are
//! HS256 JWS values signed with a shared secret; passwords are bcrypt hashes.

use crate::config::{Config, MAX_BCRYPT_COST, MIN_BCRYPT_COST, MIN_JWT_SECRET_BYTES};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::jwt::{ClaimSet, MAX_TOKEN_SIZE_BYTES};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::instrument;

/// bcrypt hash of a random value, verified when the user does not exist so
/// that a missing user costs the same as a wrong password.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// The only accepted `alg` header value.
const ACCEPTED_ALGORITHM: &str = "HS256";

// ============================================================================
// Errors
// ============================================================================

/// Fine-grained codec failures. Used for logs and metrics only; clients see
/// a generic "invalid token".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    #[error("Token too large: {0} bytes")]
    TokenTooLarge(usize),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Signature verification failed")]
    Signature,

    #[error("Token expired")]
    Expired,

    #[error("Token issued in the future")]
    IssuedInFuture,
}

impl CodecError {
    /// Short failure category for debug logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            CodecError::Encoding(_) => "encoding",
            CodecError::TokenTooLarge(_) => "size",
            CodecError::MalformedToken(_) => "malformed",
            CodecError::Signature => "signature",
            CodecError::Expired => "expired",
            CodecError::IssuedInFuture => "clock_skew",
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid bcrypt cost: {0} (must be {min}-{max})", min = MIN_BCRYPT_COST, max = MAX_BCRYPT_COST)]
    InvalidCost(u32),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

// ============================================================================
// Keys
// ============================================================================

/// HS256 signing key.
///
/// Debug is manually implemented to redact the secret. Clone is manually
/// implemented because `SecretBox` requires explicit cloning.
pub struct SigningKey {
    kid: Option<String>,
    secret: SecretBox<[u8]>,
}

impl SigningKey {
    /// Build a signing key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encoding` if the secret is shorter than
    /// [`MIN_JWT_SECRET_BYTES`].
    pub fn new(secret: &[u8], kid: Option<String>) -> Result<Self, CodecError> {
        if secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(CodecError::Encoding(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                secret.len()
            )));
        }
        Ok(Self {
            kid,
            secret: SecretBox::new(secret.to_vec().into_boxed_slice()),
        })
    }

    /// Build the signing key described by the service configuration.
    ///
    /// # Errors
    ///
    /// See [`SigningKey::new`].
    pub fn from_config(config: &Config) -> Result<Self, CodecError> {
        Self::new(config.jwt_secret.expose_secret(), config.jwt_key_id.clone())
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Key that verifies tokens signed by this key.
    #[must_use]
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey {
            kid: self.kid.clone(),
            secret: SecretBox::new(self.secret.expose_secret().to_vec().into_boxed_slice()),
        }
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self {
            kid: self.kid.clone(),
            secret: SecretBox::new(self.secret.expose_secret().to_vec().into_boxed_slice()),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// HS256 verification key.
pub struct VerificationKey {
    kid: Option<String>,
    secret: SecretBox<[u8]>,
}

impl VerificationKey {
    /// Build a verification key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encoding` if the secret is shorter than
    /// [`MIN_JWT_SECRET_BYTES`].
    pub fn new(secret: &[u8], kid: Option<String>) -> Result<Self, CodecError> {
        SigningKey::new(secret, kid).map(|k| k.verification_key())
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

impl Clone for VerificationKey {
    fn clone(&self) -> Self {
        Self {
            kid: self.kid.clone(),
            secret: SecretBox::new(self.secret.expose_secret().to_vec().into_boxed_slice()),
        }
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Sign a claim set.
///
/// The output is deterministic for a given claim set and key.
///
/// # Errors
///
/// Returns `CodecError::Encoding` if the claim set violates its invariants
/// (empty subject, `exp <= iat`) or signing fails.
#[instrument(skip_all)]
pub fn encode_claims(claims: &ClaimSet, key: &SigningKey) -> Result<String, CodecError> {
    claims
        .check_invariants()
        .map_err(|e| CodecError::Encoding(e.to_string()))?;

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());
    header.kid = key.kid.clone();

    let encoding_key = EncodingKey::from_secret(key.secret.expose_secret());

    encode(&header, claims, &encoding_key)
        .map_err(|e| CodecError::Encoding(format!("JWT signing operation failed: {}", e)))
}

/// Verify a token against the wall clock with the default clock skew.
///
/// # Errors
///
/// See [`decode_claims_at`].
pub fn decode_claims(token: &str, key: &VerificationKey) -> Result<ClaimSet, CodecError> {
    #[allow(clippy::cast_possible_wrap)]
    let skew = common::jwt::DEFAULT_CLOCK_SKEW.as_secs() as i64;
    decode_claims_at(token, key, chrono::Utc::now().timestamp(), skew)
}

/// Verify a token at a given instant.
///
/// Checks, in order:
/// - size (before any parsing)
/// - header shape, `alg == HS256` and a matching `kid`
/// - signature
/// - claim shape (`sub`, `roles`, `iat`, `exp`, non-empty subject, `exp > iat`)
/// - expiry (`now >= exp` is expired)
/// - issued-at not later than `now + clock_skew_seconds`
///
/// # Errors
///
/// Returns the first failing check as a [`CodecError`].
#[instrument(skip_all)]
pub fn decode_claims_at(
    token: &str,
    key: &VerificationKey,
    now: i64,
    clock_skew_seconds: i64,
) -> Result<ClaimSet, CodecError> {
    // Check token size BEFORE any parsing or cryptographic operations
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "auth.crypto",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(CodecError::TokenTooLarge(token.len()));
    }

    let header = read_header(token)?;

    if header.alg != ACCEPTED_ALGORITHM {
        tracing::debug!(
            target: "auth.crypto",
            alg = %header.alg,
            "Token rejected: unexpected algorithm"
        );
        return Err(CodecError::Signature);
    }

    if let (Some(token_kid), Some(key_kid)) = (header.kid.as_deref(), key.kid()) {
        if token_kid != key_kid {
            tracing::debug!(
                target: "auth.crypto",
                token_kid = %token_kid,
                key_kid = %key_kid,
                "Token rejected: key id mismatch"
            );
            return Err(CodecError::Signature);
        }
    }

    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked below against the injected clock.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let decoding_key = DecodingKey::from_secret(key.secret.expose_secret());

    let claims = decode::<ClaimSet>(token, &decoding_key, &validation)
        .map_err(|e| {
            tracing::debug!(target: "auth.crypto", error = %e, "Token verification failed");
            map_jwt_error(&e)
        })?
        .claims;

    claims
        .check_invariants()
        .map_err(|e| CodecError::MalformedToken(e.to_string()))?;

    if claims.is_expired_at(now) {
        tracing::debug!(
            target: "auth.crypto",
            exp = claims.expires_at,
            now = now,
            "Token rejected: expired"
        );
        return Err(CodecError::Expired);
    }

    check_issued_at(claims.issued_at, now, clock_skew_seconds)?;

    Ok(claims)
}

/// Reject tokens whose `iat` is more than `clock_skew_seconds` ahead of `now`.
fn check_issued_at(iat: i64, now: i64, clock_skew_seconds: i64) -> Result<(), CodecError> {
    let max_iat = now.saturating_add(clock_skew_seconds);
    if iat > max_iat {
        tracing::debug!(
            target: "auth.crypto",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_seconds = clock_skew_seconds,
            "Token rejected: iat too far in the future"
        );
        return Err(CodecError::IssuedInFuture);
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Parse the header segment without trusting it.
fn read_header(token: &str) -> Result<RawHeader, CodecError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(_payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CodecError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|e| CodecError::MalformedToken(format!("header is not base64url: {}", e)))?;

    serde_json::from_slice(&header_bytes)
        .map_err(|e| CodecError::MalformedToken(format!("header is not valid JSON: {}", e)))
}

fn map_jwt_error(err: &jsonwebtoken::errors::Error) -> CodecError {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat => CodecError::Signature,
        ErrorKind::ExpiredSignature => CodecError::Expired,
        _ => CodecError::MalformedToken(err.to_string()),
    }
}

// ============================================================================
// Passwords
// ============================================================================

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `PasswordError::InvalidCost` if `cost` is outside
/// [`MIN_BCRYPT_COST`]..=[`MAX_BCRYPT_COST`], or `PasswordError::Hashing` if
/// bcrypt fails.
#[instrument(skip_all)]
pub fn hash_password(password: &SecretString, cost: u32) -> Result<SecretString, PasswordError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(PasswordError::InvalidCost(cost));
    }

    bcrypt::hash(password.expose_secret(), cost)
        .map(SecretString::from)
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Compare a password against a bcrypt hash.
///
/// A malformed hash counts as a mismatch.
#[instrument(skip_all)]
pub fn verify_password(password: &SecretString, hash: &SecretString) -> bool {
    match bcrypt::verify(password.expose_secret(), hash.expose_secret()) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(target: "auth.crypto", error = %e, "Password hash could not be verified");
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

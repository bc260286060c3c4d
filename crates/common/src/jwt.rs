//! Token claims and helpers shared by the issuing service and its consumers.
//!
//! This module provides:
//! - The typed [`ClaimSet`] carried inside every session token
//! - The [`UserDetails`] projection returned over the validation RPC
//! - Size and clock skew limits
//! - Logging helpers that never print a whole token
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The `sub` field in [`ClaimSet`] is redacted in Debug output
//! - [`token_prefix`] is the only way tokens should reach a log line

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed token size in bytes (4KB).
///
/// A typical session token is 250-400 bytes (HS256 signature, a handful of
/// roles). Anything larger is rejected before base64 decoding or signature
/// verification.
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_TOKEN_SIZE_BYTES: usize = 4096; // 4KB

/// Default clock skew tolerance for the `iat` claim (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Authorization header scheme prefix.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Number of leading token characters that may appear in logs.
pub const TOKEN_LOG_PREFIX_CHARS: usize = 10;

// =============================================================================
// Claims Types
// =============================================================================

/// Structural problems with a claim set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSetError {
    /// The subject (username) is empty.
    #[error("claim set subject is empty")]
    EmptySubject,

    /// `exp` is not strictly after `iat`.
    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Signed payload of a session token.
///
/// Timestamps are Unix epoch seconds. Roles are an ordered set so that the
/// same identity always encodes to the same bytes.
///
/// # Security
///
/// The subject is a username and is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (username).
    #[serde(rename = "sub")]
    pub subject: String,

    /// Role names granted to the subject.
    pub roles: BTreeSet<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(rename = "iat")]
    pub issued_at: i64,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("subject", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl ClaimSet {
    /// Build a claim set valid for `ttl_seconds` starting at `issued_at`.
    ///
    /// # Errors
    ///
    /// - `ClaimSetError::EmptySubject` - `subject` is empty
    /// - `ClaimSetError::InvalidTimeWindow` - `ttl_seconds` is not positive
    pub fn new<I, S>(
        subject: impl Into<String>,
        roles: I,
        issued_at: i64,
        ttl_seconds: i64,
    ) -> Result<Self, ClaimSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let claims = Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            issued_at,
            expires_at: issued_at.saturating_add(ttl_seconds),
        };
        claims.check_invariants()?;
        Ok(claims)
    }

    /// Check the structural invariants of the claim set.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), ClaimSetError> {
        if self.subject.is_empty() {
            return Err(ClaimSetError::EmptySubject);
        }
        if self.expires_at <= self.issued_at {
            return Err(ClaimSetError::InvalidTimeWindow);
        }
        Ok(())
    }

    /// Whether the claim set is expired at `now` (expiry is exclusive).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Exact, case-sensitive role membership.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True iff at least one of `roles` is granted. An empty `roles` is never satisfied.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.roles.contains(r.as_ref()))
    }

    /// Seconds remaining until expiry at `now`, floored at zero.
    #[must_use]
    pub fn remaining_seconds_at(&self, now: i64) -> u64 {
        u64::try_from(self.expires_at.saturating_sub(now)).unwrap_or(0)
    }
}

/// Caller identity as returned by the `user-details` RPC operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub username: String,
    pub roles: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<&ClaimSet> for UserDetails {
    fn from(claims: &ClaimSet) -> Self {
        Self {
            username: claims.subject.clone(),
            roles: claims.roles.iter().cloned().collect(),
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Strip an optional `Bearer ` prefix from a token value.
///
/// The RPC operations accept tokens with or without the prefix; the HTTP
/// gate requires it and parses the header itself.
#[must_use]
pub fn strip_bearer(value: &str) -> &str {
    value.strip_prefix(BEARER_PREFIX).unwrap_or(value)
}

/// Loggable prefix of a token.
///
/// Never log a whole token: a valid bearer token in a log file is a valid
/// credential for anyone who can read the log.
#[must_use]
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_LOG_PREFIX_CHARS).collect();
    if token.chars().count() > TOKEN_LOG_PREFIX_CHARS {
        format!("{prefix}...")
    } else {
        prefix
    }
}

// =============================================================================
// Tests
// =============================================================================

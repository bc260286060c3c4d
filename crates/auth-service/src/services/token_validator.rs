//! Read-only queries over a token.
//!
//! Every query verifies signature, shape and expiry first. A token that fails
//! verification answers `false`, an empty set, or `None`; the reason is only
//! visible in debug logs. The `auth_token_validations_total` metric counts
//! failures without saying why.

use crate::clock::Clock;
use crate::crypto::{self, CodecError, VerificationKey};
use crate::observability::metrics::record_token_validation;
use common::jwt::{token_prefix, ClaimSet, UserDetails};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct TokenValidator {
    key: Arc<VerificationKey>,
    clock: Arc<dyn Clock>,
    clock_skew_seconds: i64,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("key", &self.key)
            .field("clock", &self.clock)
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(key: Arc<VerificationKey>, clock: Arc<dyn Clock>, clock_skew_seconds: i64) -> Self {
        Self {
            key,
            clock,
            clock_skew_seconds,
        }
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the codec failure.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<ClaimSet, CodecError> {
        let result =
            crypto::decode_claims_at(token, &self.key, self.clock.now(), self.clock_skew_seconds);

        match &result {
            Ok(_) => record_token_validation("success"),
            Err(e) => {
                record_token_validation("error");
                tracing::debug!(
                    target: "auth.validator",
                    token_prefix = %token_prefix(token),
                    error_category = e.category(),
                    "Token failed validation"
                );
            }
        }

        result
    }

    #[must_use]
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }

    #[must_use]
    pub fn claims(&self, token: &str) -> Option<ClaimSet> {
        self.verify(token).ok()
    }

    #[must_use]
    pub fn username(&self, token: &str) -> Option<String> {
        self.claims(token).map(|c| c.subject)
    }

    /// Roles of a valid token; empty otherwise.
    #[must_use]
    pub fn roles(&self, token: &str) -> BTreeSet<String> {
        self.claims(token).map(|c| c.roles).unwrap_or_default()
    }

    /// Exact, case-sensitive membership.
    #[must_use]
    pub fn has_role(&self, token: &str, role: &str) -> bool {
        self.claims(token).is_some_and(|c| c.has_role(role))
    }

    /// `false` for an empty `roles` without looking at the token.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, token: &str, roles: &[S]) -> bool {
        if roles.is_empty() {
            return false;
        }
        self.claims(token).is_some_and(|c| c.has_any_role(roles))
    }

    /// Token is valid and its subject is exactly `expected_username`.
    #[must_use]
    pub fn belongs_to(&self, token: &str, expected_username: &str) -> bool {
        self.claims(token)
            .is_some_and(|c| c.subject == expected_username)
    }

    #[must_use]
    pub fn user_details(&self, token: &str) -> Option<UserDetails> {
        self.claims(token).as_ref().map(UserDetails::from)
    }
}

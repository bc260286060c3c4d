//! Credential check and token issuance.

use crate::clock::Clock;
use crate::crypto::{self, CodecError, SigningKey, DUMMY_PASSWORD_HASH};
use crate::directory::{IdentityProvider, LookupError};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{record_issuance_failure, record_token_issuance};
use common::jwt::ClaimSet;
use common::rpc::LoginResponse;
use common::secret::SecretString;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

/// Why an issuance attempt failed. Internal only; every variant except
/// `Encoding` reaches the client as the same "invalid credentials".
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("User not found")]
    UserNotFound,

    #[error("Password mismatch")]
    InvalidCredentials,

    #[error("Identity lookup failed: {0}")]
    Lookup(LookupError),

    #[error(transparent)]
    Encoding(#[from] CodecError),
}

impl IssueError {
    /// Failure reason for the `auth.issuer` log.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            IssueError::UserNotFound => "user_not_found",
            IssueError::InvalidCredentials => "invalid_credentials",
            IssueError::Lookup(_) => "lookup",
            IssueError::Encoding(_) => "encoding",
        }
    }

    /// Label for the public `reason` metric dimension. Every credential or
    /// lookup failure shares one value.
    #[must_use]
    pub fn metric_reason(&self) -> &'static str {
        match self {
            IssueError::UserNotFound
            | IssueError::InvalidCredentials
            | IssueError::Lookup(_) => "rejected",
            IssueError::Encoding(_) => "internal",
        }
    }
}

/// A freshly signed token and the claims inside it.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: ClaimSet,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        let expires_in = issued.claims.remaining_seconds_at(issued.claims.issued_at);
        Self {
            token: issued.token,
            token_type: "Bearer".to_string(),
            username: issued.claims.subject,
            roles: issued.claims.roles.into_iter().collect(),
            expires_in,
        }
    }
}

/// Exchanges credentials for signed tokens. Holds no mutable state.
#[derive(Clone)]
pub struct TokenIssuer {
    directory: Arc<dyn IdentityProvider>,
    signing_key: Arc<SigningKey>,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("signing_key", &self.signing_key)
            .field("clock", &self.clock)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(
        directory: Arc<dyn IdentityProvider>,
        signing_key: Arc<SigningKey>,
        clock: Arc<dyn Clock>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            directory,
            signing_key,
            clock,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Verify credentials and issue a token valid for the configured TTL.
    ///
    /// bcrypt always runs, against a dummy hash when the user is unknown or
    /// the lookup failed, so every failure path costs about the same.
    ///
    /// # Errors
    ///
    /// - `IssueError::UserNotFound` - the directory has no such user
    /// - `IssueError::Lookup` - the directory could not answer
    /// - `IssueError::InvalidCredentials` - password mismatch
    /// - `IssueError::Encoding` - the claim set could not be signed
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<IssuedToken, IssueError> {
        let start = Instant::now();
        let result = self.issue(username, password).await;

        match &result {
            Ok(issued) => {
                record_token_issuance("success", start.elapsed());
                tracing::info!(
                    target: "auth.issuer",
                    user = %hash_for_correlation(username),
                    roles = ?issued.claims.roles,
                    expires_at = issued.claims.expires_at,
                    "Token issued"
                );
            }
            Err(e) => {
                record_token_issuance("error", start.elapsed());
                record_issuance_failure(e.metric_reason());
                tracing::warn!(
                    target: "auth.issuer",
                    user = %hash_for_correlation(username),
                    reason = e.reason(),
                    error = %e,
                    "Token issuance rejected"
                );
            }
        }

        result
    }

    async fn issue(&self, username: &str, password: &SecretString) -> Result<IssuedToken, IssueError> {
        let lookup = self.directory.find_by_username(username).await;

        // Always run bcrypt to prevent timing attacks
        let dummy = SecretString::from(DUMMY_PASSWORD_HASH);
        let hash_to_verify = match &lookup {
            Ok(record) => &record.password_hash,
            Err(_) => &dummy,
        };
        let password_matches = crypto::verify_password(password, hash_to_verify);

        let record = lookup.map_err(|e| match e {
            LookupError::NotFound => IssueError::UserNotFound,
            other => IssueError::Lookup(other),
        })?;

        if !password_matches {
            return Err(IssueError::InvalidCredentials);
        }

        let now = self.clock.now();
        let claims = ClaimSet::new(record.username, record.roles, now, self.ttl_seconds)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;

        let token = crypto::encode_claims(&claims, &self.signing_key)?;

        Ok(IssuedToken { token, claims })
    }
}

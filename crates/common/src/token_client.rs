//! Remote token client for services that do not hold the signing key.
//!
//! Forwards validate/extract/role-check calls to the token service's RPC
//! interface (see [`crate::rpc`]).
//!
//! # Behavior
//!
//! - Every call has a bounded timeout (default 5s) and a connect timeout
//! - Exactly one attempt per call; nothing is retried
//! - Fail-closed: any failure yields `false`, an empty set, or `None`
//! - Failures are logged with the operation name and a token prefix, then swallowed
//!
//! `username_from_token` reads the username from the user-details call and
//! only when that call fails asks the dedicated username operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_client::{RemoteTokenClient, TokenClientConfig};
//!
//! let client = RemoteTokenClient::new(TokenClientConfig::new("http://auth:8082"))?;
//! if client.has_role(bearer, "TEACHER").await {
//!     // ...
//! }
//! ```

use crate::jwt::{token_prefix, UserDetails};
use crate::rpc::{
    AnyRoleCheckRequest, LoginResponse, RoleCheckRequest, RolesResponse, TokenRequest,
    UserDetailsResponse, UsernameCheckRequest, UsernameResponse, ValidityResponse,
    AUTHENTICATE_PATH, EXTRACT_ROLES_PATH, HAS_ANY_ROLE_PATH, HAS_ROLE_PATH,
    USERNAME_FROM_TOKEN_PATH, USER_DETAILS_PATH, VALIDATE_TOKEN_FOR_USERNAME_PATH,
    VALIDATE_TOKEN_PATH,
};
use crate::secret::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Error Types
// =============================================================================

/// Errors from a single remote call.
///
/// These never escape the public query operations; they are logged and
/// converted to the fail-closed default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenClientError {
    /// Transport failure (connection refused, reset, DNS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call exceeded its timeout.
    #[error("Remote call timed out")]
    Timeout,

    /// The token service answered with a non-2xx status.
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// The body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The client could not be configured.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for TokenClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`RemoteTokenClient`].
#[derive(Debug, Clone)]
pub struct TokenClientConfig {
    /// Token service base URL (e.g., `http://localhost:8082`).
    pub endpoint: String,

    /// Upper bound for one call, including reading the body.
    pub call_timeout: Duration,

    /// Upper bound for establishing the connection.
    pub connect_timeout: Duration,
}

impl TokenClientConfig {
    /// Create a configuration with default timeouts.
    ///
    /// # Security Warning
    ///
    /// Plain HTTP sends bearer tokens and passwords in clear text. Use
    /// [`TokenClientConfig::new_secure`] outside of local development.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a configuration requiring HTTPS.
    ///
    /// # Errors
    ///
    /// Returns `TokenClientError::Configuration` if the URL doesn't use HTTPS.
    pub fn new_secure(endpoint: impl Into<String>) -> Result<Self, TokenClientError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("https://") {
            return Err(TokenClientError::Configuration(
                "token service endpoint must use HTTPS".into(),
            ));
        }
        Ok(Self::new(endpoint))
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Fail-closed client for the token service RPC interface.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RemoteTokenClient {
    config: TokenClientConfig,
    http_client: reqwest::Client,
}

impl RemoteTokenClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns `TokenClientError::Configuration` if the endpoint is empty or
    /// the HTTP client cannot be built.
    pub fn new(config: TokenClientConfig) -> Result<Self, TokenClientError> {
        if config.endpoint.is_empty() {
            return Err(TokenClientError::Configuration(
                "token service endpoint is empty".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                TokenClientError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &TokenClientConfig {
        &self.config
    }

    /// Whether the token has a valid signature and is not expired.
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> bool {
        let body = TokenRequest {
            token: token.to_string(),
        };
        match self
            .call::<_, ValidityResponse>(VALIDATE_TOKEN_PATH, &body)
            .await
        {
            Ok(resp) => resp.valid,
            Err(e) => {
                log_failure("validate_token", token, &e);
                false
            }
        }
    }

    /// Caller identity, or `None` when the token is invalid or the call fails.
    #[instrument(skip_all)]
    pub async fn user_details(&self, token: &str) -> Option<UserDetails> {
        match self.fetch_user_details(token).await {
            Ok(resp) => resp.details,
            Err(e) => {
                log_failure("user_details", token, &e);
                None
            }
        }
    }

    /// Roles granted by the token; empty on any failure.
    #[instrument(skip_all)]
    pub async fn extract_roles(&self, token: &str) -> BTreeSet<String> {
        let body = TokenRequest {
            token: token.to_string(),
        };
        match self.call::<_, RolesResponse>(EXTRACT_ROLES_PATH, &body).await {
            Ok(resp) => resp.roles,
            Err(e) => {
                log_failure("extract_roles", token, &e);
                BTreeSet::new()
            }
        }
    }

    /// Whether the token is valid and grants `role`.
    #[instrument(skip_all, fields(role = %role))]
    pub async fn has_role(&self, token: &str, role: &str) -> bool {
        let body = RoleCheckRequest {
            token: token.to_string(),
            role: role.to_string(),
        };
        match self.call::<_, ValidityResponse>(HAS_ROLE_PATH, &body).await {
            Ok(resp) => resp.valid,
            Err(e) => {
                log_failure("has_role", token, &e);
                false
            }
        }
    }

    /// Whether the token is valid and grants at least one of `roles`.
    ///
    /// An empty `roles` is answered locally with `false`.
    #[instrument(skip_all)]
    pub async fn has_any_role<S: AsRef<str>>(&self, token: &str, roles: &[S]) -> bool {
        if roles.is_empty() {
            return false;
        }
        let body = AnyRoleCheckRequest {
            token: token.to_string(),
            roles: roles.iter().map(|r| r.as_ref().to_string()).collect(),
        };
        match self
            .call::<_, ValidityResponse>(HAS_ANY_ROLE_PATH, &body)
            .await
        {
            Ok(resp) => resp.valid,
            Err(e) => {
                log_failure("has_any_role", token, &e);
                false
            }
        }
    }

    /// Whether the token is valid and its subject is `username`.
    #[instrument(skip_all)]
    pub async fn validate_token_for_username(&self, token: &str, username: &str) -> bool {
        let body = UsernameCheckRequest {
            token: token.to_string(),
            username: username.to_string(),
        };
        match self
            .call::<_, ValidityResponse>(VALIDATE_TOKEN_FOR_USERNAME_PATH, &body)
            .await
        {
            Ok(resp) => resp.valid,
            Err(e) => {
                log_failure("validate_token_for_username", token, &e);
                false
            }
        }
    }

    /// Subject of the token.
    ///
    /// Reads `username` from the user-details call. If that call fails, asks
    /// the username operation once. A user-details answer that reports an
    /// invalid token is final.
    #[instrument(skip_all)]
    pub async fn username_from_token(&self, token: &str) -> Option<String> {
        match self.fetch_user_details(token).await {
            Ok(resp) => return resp.details.map(|d| d.username),
            Err(e) => {
                log_failure("username_from_token.user_details", token, &e);
            }
        }

        debug!(
            target: "common.token_client",
            token_prefix = %token_prefix(token),
            "Falling back to username operation"
        );

        let body = TokenRequest {
            token: token.to_string(),
        };
        match self
            .call::<_, UsernameResponse>(USERNAME_FROM_TOKEN_PATH, &body)
            .await
        {
            Ok(resp) => resp.username,
            Err(e) => {
                log_failure("username_from_token.username", token, &e);
                None
            }
        }
    }

    /// Exchange credentials for a token. `None` on rejection or failure.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Option<LoginResponse> {
        let body = serde_json::json!({
            "username": username,
            "password": password.expose_secret(),
        });
        match self.call::<_, LoginResponse>(AUTHENTICATE_PATH, &body).await {
            Ok(resp) => Some(resp),
            Err(e) => {
                warn!(
                    target: "common.token_client",
                    operation = "authenticate",
                    error = %e,
                    "Remote token call failed, failing closed"
                );
                None
            }
        }
    }

    async fn fetch_user_details(&self, token: &str) -> Result<UserDetailsResponse, TokenClientError> {
        let body = TokenRequest {
            token: token.to_string(),
        };
        self.call(USER_DETAILS_PATH, &body).await
    }

    /// One POST, no retry.
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, TokenClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.endpoint, path);

        let response = self.http_client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenClientError::Status(status.as_u16()));
        }

        response.json::<R>().await.map_err(TokenClientError::from)
    }
}

fn log_failure(operation: &'static str, token: &str, error: &TokenClientError) {
    warn!(
        target: "common.token_client",
        operation = operation,
        token_prefix = %token_prefix(token),
        error = %error,
        "Remote token call failed, failing closed"
    );
}

// =============================================================================
// Tests
// =============================================================================

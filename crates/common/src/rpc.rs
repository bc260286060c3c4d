//! Wire contract for the token validation RPC interface.
//!
//! The issuing service mounts these paths; [`crate::token_client`] calls them.
//! Every operation is a JSON `POST`. Token-reading operations never answer an
//! invalid token with an error status: they report `false`, an empty
//! collection, or `null` in a `200` body.
//!
//! Token fields accept an optional `Bearer ` prefix (see [`crate::jwt::strip_bearer`]).

use crate::jwt::UserDetails;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Paths
// =============================================================================

/// Exchange credentials for a token.
pub const AUTHENTICATE_PATH: &str = "/api/v1/token/authenticate";

/// Signature and expiry check.
pub const VALIDATE_TOKEN_PATH: &str = "/api/v1/token/validate";

/// Caller identity projection.
pub const USER_DETAILS_PATH: &str = "/api/v1/token/user-details";

/// Role set of the caller.
pub const EXTRACT_ROLES_PATH: &str = "/api/v1/token/roles";

/// Single role membership.
pub const HAS_ROLE_PATH: &str = "/api/v1/token/has-role";

/// Membership in any of several roles.
pub const HAS_ANY_ROLE_PATH: &str = "/api/v1/token/has-any-role";

/// Token is valid and names the expected user.
pub const VALIDATE_TOKEN_FOR_USERNAME_PATH: &str = "/api/v1/token/validate-for-username";

/// Subject of the token.
pub const USERNAME_FROM_TOKEN_PATH: &str = "/api/v1/token/username";

// =============================================================================
// Requests
// =============================================================================

/// Body carrying only a token.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Body for the `has-role` operation.
#[derive(Clone, Serialize, Deserialize)]
pub struct RoleCheckRequest {
    pub token: String,
    pub role: String,
}

/// Body for the `has-any-role` operation.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnyRoleCheckRequest {
    pub token: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Body for the `validate-token-for-username` operation.
#[derive(Clone, Serialize, Deserialize)]
pub struct UsernameCheckRequest {
    pub token: String,
    pub username: String,
}

/// Body for the `authenticate` operation.
///
/// Deserialize-only: the password is a [`SecretString`], which refuses to
/// serialize. Callers build the request body explicitly.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(alias = "userName")]
    pub username: String,
    pub password: SecretString,
}

macro_rules! redacted_token_debug {
    ($ty:ident { $($field:ident),* }) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("token", &"[REDACTED]")
                    $(.field(stringify!($field), &self.$field))*
                    .finish()
            }
        }
    };
}

redacted_token_debug!(TokenRequest {});
redacted_token_debug!(RoleCheckRequest { role });
redacted_token_debug!(AnyRoleCheckRequest { roles });
redacted_token_debug!(UsernameCheckRequest { username });

// =============================================================================
// Responses
// =============================================================================

/// Boolean answer (`validate`, `has-role`, `has-any-role`, `validate-for-username`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityResponse {
    pub valid: bool,
}

/// Answer to `roles`. Empty when the token is not valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: BTreeSet<String>,
}

/// Answer to `username`. `null` when the token is not valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameResponse {
    pub username: Option<String>,
}

/// Answer to `user-details`. `null` when the token is not valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetailsResponse {
    pub details: Option<UserDetails>,
}

/// Successful login or `authenticate` answer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub username: String,
    pub roles: Vec<String>,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("username", &self.username)
            .field("roles", &self.roles)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

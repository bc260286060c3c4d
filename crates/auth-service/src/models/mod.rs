use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Body of `POST /api/v1/auth/login`.
///
/// `userName` is accepted for older clients.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "userName")]
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `GET /api/v1/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub roles: BTreeSet<String>,
}

//! Builder patterns for test data construction
//!
//! Tokens are signed here with `jsonwebtoken` directly, not through the
//! service codec, so tests can produce claim sets the service would never
//! issue (expired, empty subject, future `iat`, foreign `kid`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

/// Builder for signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_role("TEACHER")
///     .issued_at(TEST_NOW)
///     .expires_in(10)
///     .sign(&test_signing_secret(1));
/// ```
pub struct TestTokenBuilder {
    sub: String,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
    kid: Option<String>,
}

impl TestTokenBuilder {
    /// Create a new token builder: subject `test-subject`, no roles,
    /// issued now, valid for one hour
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: "test-subject".to_string(),
            roles: Vec::new(),
            iat: now,
            exp: now + 3600,
            kid: None,
        }
    }

    /// Set the subject (username)
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Add one role
    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    /// Replace the role list
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Set issued-at and keep the current lifetime
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        let ttl = self.exp - self.iat;
        self.iat = timestamp;
        self.exp = timestamp + ttl;
        self
    }

    /// Set expiration in seconds after issued-at
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = self.iat + seconds;
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Set the `kid` header
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Build the claims as a JSON value
    pub fn build_claims(&self) -> serde_json::Value {
        json!({
            "sub": self.sub,
            "roles": self.roles,
            "iat": self.iat,
            "exp": self.exp,
        })
    }

    /// Sign with HS256 over `secret`
    pub fn sign(self, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        header.kid = self.kid.clone();

        encode(
            &header,
            &self.build_claims(),
            &EncodingKey::from_secret(secret),
        )
        .expect("HS256 signing of test claims should not fail")
    }

    /// Unsigned token with `alg: none`
    pub fn unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(self.build_claims().to_string());
        format!("{header}.{payload}.")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Change one character in the middle of the payload segment.
pub fn tamper_payload(token: &str) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3, "token must have three segments");

    let mut payload: Vec<char> = parts[1].chars().collect();
    let middle = payload.len() / 2;
    payload[middle] = if payload[middle] == 'A' { 'B' } else { 'A' };
    let payload: String = payload.into_iter().collect();

    format!("{}.{}.{}", parts[0], payload, parts[2])
}

/// Token padded past the service's size limit.
pub fn oversized_token() -> String {
    format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", "a".repeat(5000))
}

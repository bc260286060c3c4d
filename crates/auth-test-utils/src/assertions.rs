//! Custom test assertions for expressive tests
//!
//! These read token segments without verifying the signature; signature
//! checks belong to the service under test.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let parts: Vec<_> = token.split('.').collect();
    assert_eq!(
        parts.len(),
        3,
        "Token must have 3 parts (header.payload.signature), got {}",
        parts.len()
    );
    URL_SAFE_NO_PAD
        .decode(parts[index])
        .unwrap_or_else(|e| panic!("Failed to base64 decode token segment {index}: {e}"))
}

fn header(token: &str) -> TokenHeader {
    serde_json::from_slice(&segment(token, 0)).expect("Failed to parse token header")
}

fn claims(token: &str) -> TokenClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse token claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_has_role("TEACHER")
///     .assert_lifetime(10);
/// ```
pub trait TokenAssertions {
    /// Assert three segments, an HS256/JWT header and a parseable claim set
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the token carries `role`
    fn assert_has_role(&self, role: &str) -> &Self;

    /// Assert the token carries exactly `roles`, in any order
    fn assert_roles(&self, roles: &[&str]) -> &Self;

    /// Assert the `kid` header
    fn assert_signed_by(&self, key_id: &str) -> &Self;

    /// Assert `exp - iat`
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert the subject
    fn assert_for_subject(&self, subject: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let header = header(self);
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let claims = claims(self);
        assert!(
            claims.exp > claims.iat,
            "Expected exp > iat, got iat={} exp={}",
            claims.iat,
            claims.exp
        );

        self
    }

    fn assert_has_role(&self, role: &str) -> &Self {
        let claims = claims(self);
        assert!(
            claims.roles.iter().any(|r| r == role),
            "Token does not contain role '{}'. Available roles: {:?}",
            role,
            claims.roles
        );
        self
    }

    fn assert_roles(&self, roles: &[&str]) -> &Self {
        let mut actual = claims(self).roles;
        actual.sort();
        let mut expected: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        expected.sort();
        assert_eq!(actual, expected, "Unexpected role set");
        self
    }

    fn assert_signed_by(&self, key_id: &str) -> &Self {
        let header = header(self);
        assert_eq!(
            header.kid.as_deref(),
            Some(key_id),
            "Expected key_id '{}', got {:?}",
            key_id,
            header.kid
        );
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.exp - claims.iat,
            seconds,
            "Expected a {}s lifetime, got {}s",
            seconds,
            claims.exp - claims.iat
        );
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );
        self
    }
}

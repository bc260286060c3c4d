//! E2E tests for token verification: expiry, tampering and foreign tokens.
//!
//! Every case goes through the `validate` RPC operation of a real server whose
//! clock is driven by the test.

use auth_test_utils::*;
use common::rpc::{RoleCheckRequest, TokenRequest, ValidityResponse, HAS_ROLE_PATH, VALIDATE_TOKEN_PATH};
use std::time::Duration;

async fn is_valid(server: &TestAuthServer, token: &str) -> Result<bool, anyhow::Error> {
    let response: ValidityResponse = reqwest::Client::new()
        .post(format!("{}{}", server.url(), VALIDATE_TOKEN_PATH))
        .json(&TokenRequest {
            token: token.to_string(),
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.valid)
}

async fn has_role(server: &TestAuthServer, token: &str, role: &str) -> Result<bool, anyhow::Error> {
    let response: ValidityResponse = reqwest::Client::new()
        .post(format!("{}{}", server.url(), HAS_ROLE_PATH))
        .json(&RoleCheckRequest {
            token: token.to_string(),
            role: role.to_string(),
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.valid)
}

// ============================================================================
// Expiry
// ============================================================================

/// alice logs in with a 10 second lifetime; after 11 seconds her token is
/// worthless.
#[tokio::test]
async fn test_token_expires_after_ttl() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::builder().with_ttl(10).spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    assert!(is_valid(&server, &token).await?);
    assert!(has_role(&server, &token, ROLE_TEACHER).await?);

    // Act
    server.advance_clock(Duration::from_secs(11));

    // Assert
    assert!(!is_valid(&server, &token).await?, "Expired token must be invalid");
    assert!(
        !has_role(&server, &token, ROLE_TEACHER).await?,
        "Expired token must not grant roles"
    );

    Ok(())
}

/// `now == exp` is already expired; one second earlier is not.
#[tokio::test]
async fn test_token_expiry_boundary() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder().with_ttl(10).spawn().await?;
    let token = server.login_token(TEST_USER_BOB, TEST_PASSWORD_BOB).await?;

    server.advance_clock(Duration::from_secs(9));
    assert!(is_valid(&server, &token).await?);

    server.advance_clock(Duration::from_secs(1));
    assert!(!is_valid(&server, &token).await?);

    Ok(())
}

// ============================================================================
// Integrity
// ============================================================================

/// Changing a single payload character invalidates the signature.
#[tokio::test]
async fn test_tampered_payload_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let tampered = tamper_payload(&token);

    assert!(!is_valid(&server, &tampered).await?);

    Ok(())
}

/// A token signed with another secret is rejected even with plausible claims.
#[tokio::test]
async fn test_foreign_signing_key_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let forged = TestTokenBuilder::new()
        .for_user(TEST_USER_CAROL)
        .with_role(ROLE_ADMIN)
        .issued_at(server.now())
        .sign(&test_signing_secret(2));

    assert!(!is_valid(&server, &forged).await?);
    assert!(!has_role(&server, &forged, ROLE_ADMIN).await?);

    Ok(())
}

/// `alg: none` is never accepted.
#[tokio::test]
async fn test_unsigned_token_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let unsigned = TestTokenBuilder::new()
        .for_user(TEST_USER_CAROL)
        .with_role(ROLE_ADMIN)
        .issued_at(server.now())
        .unsigned();

    assert!(!is_valid(&server, &unsigned).await?);

    Ok(())
}

/// Tokens over the size limit are refused before parsing.
#[tokio::test]
async fn test_oversized_token_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    assert!(!is_valid(&server, &oversized_token()).await?);

    Ok(())
}

/// Signed with the right secret but an empty subject.
#[tokio::test]
async fn test_empty_subject_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let token = TestTokenBuilder::new()
        .for_user("")
        .issued_at(server.now())
        .sign(&server.signing_secret());

    assert!(!is_valid(&server, &token).await?);

    Ok(())
}

/// A token directly signed by the harness is accepted, which keeps the
/// rejection tests above honest.
#[tokio::test]
async fn test_harness_signed_token_is_accepted() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let token = server.issue_token(TEST_USER_BOB, &[ROLE_USER]);

    assert!(is_valid(&server, &token).await?);

    Ok(())
}

// ============================================================================
// Clock skew and key IDs
// ============================================================================

/// `iat` slightly ahead of the server clock is tolerated; far ahead is not.
#[tokio::test]
async fn test_issued_at_clock_skew() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder().with_clock_skew(300).spawn().await?;

    let slightly_ahead = TestTokenBuilder::new()
        .for_user(TEST_USER_ALICE)
        .issued_at(server.now() + 100)
        .sign(&server.signing_secret());
    let far_ahead = TestTokenBuilder::new()
        .for_user(TEST_USER_ALICE)
        .issued_at(server.now() + 600)
        .sign(&server.signing_secret());

    assert!(is_valid(&server, &slightly_ahead).await?);
    assert!(!is_valid(&server, &far_ahead).await?);

    Ok(())
}

/// A server with a key ID refuses tokens naming another key.
#[tokio::test]
async fn test_mismatched_key_id_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder()
        .with_kid(TEST_KEY_ID_1)
        .spawn()
        .await?;

    let matching = TestTokenBuilder::new()
        .for_user(TEST_USER_ALICE)
        .issued_at(server.now())
        .with_kid(TEST_KEY_ID_1)
        .sign(&server.signing_secret());
    let mismatched = TestTokenBuilder::new()
        .for_user(TEST_USER_ALICE)
        .issued_at(server.now())
        .with_kid(TEST_KEY_ID_2)
        .sign(&server.signing_secret());

    assert!(is_valid(&server, &matching).await?);
    assert!(!is_valid(&server, &mismatched).await?);

    Ok(())
}

//! E2E tests for `RemoteTokenClient` against a real server, plus the failure
//! modes only a stub upstream can produce.

use auth_test_utils::*;
use common::rpc::{USERNAME_FROM_TOKEN_PATH, USER_DETAILS_PATH, VALIDATE_TOKEN_PATH};
use common::secret::SecretString;
use common::token_client::{RemoteTokenClient, TokenClientConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(url: String) -> Result<RemoteTokenClient, anyhow::Error> {
    Ok(RemoteTokenClient::new(
        TokenClientConfig::new(url).with_call_timeout(Duration::from_millis(500)),
    )?)
}

// ============================================================================
// Against the real server
// ============================================================================

#[tokio::test]
async fn test_remote_client_queries_match_local_answers() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let client = client_for(server.url())?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    // Act / Assert
    assert!(client.validate_token(&token).await);
    assert!(client.has_role(&token, ROLE_TEACHER).await);
    assert!(!client.has_role(&token, ROLE_ADMIN).await);
    assert!(client.has_any_role(&token, &[ROLE_ADMIN, ROLE_TEACHER]).await);
    assert!(!client.has_any_role::<&str>(&token, &[]).await);
    assert!(client.validate_token_for_username(&token, TEST_USER_ALICE).await);
    assert_eq!(
        client.username_from_token(&token).await.as_deref(),
        Some(TEST_USER_ALICE)
    );

    let roles = client.extract_roles(&token).await;
    assert!(roles.contains(ROLE_TEACHER));
    assert_eq!(roles.len(), 1);

    let details = client
        .user_details(&token)
        .await
        .ok_or_else(|| anyhow::anyhow!("missing details"))?;
    assert_eq!(details.username, TEST_USER_ALICE);

    Ok(())
}

#[tokio::test]
async fn test_remote_client_expired_token_fails_closed() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder().with_ttl(10).spawn().await?;
    let client = client_for(server.url())?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    server.advance_clock(Duration::from_secs(11));

    assert!(!client.validate_token(&token).await);
    assert!(client.extract_roles(&token).await.is_empty());
    assert!(client.user_details(&token).await.is_none());
    assert!(client.username_from_token(&token).await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_remote_client_authenticate() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = client_for(server.url())?;

    let ok = client
        .authenticate(TEST_USER_BOB, &SecretString::from(TEST_PASSWORD_BOB))
        .await;
    let rejected = client
        .authenticate(TEST_USER_BOB, &SecretString::from("wrong"))
        .await;

    let ok = ok.ok_or_else(|| anyhow::anyhow!("login should succeed"))?;
    assert_eq!(ok.username, TEST_USER_BOB);
    assert!(client.validate_token(&ok.token).await);
    assert!(rejected.is_none());

    Ok(())
}

// ============================================================================
// Upstream failures
// ============================================================================

/// A slow upstream trips the call timeout and the answer is `false`.
#[tokio::test]
async fn test_remote_client_timeout_fails_closed() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VALIDATE_TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "valid": true }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&upstream)
        .await;

    let client = RemoteTokenClient::new(
        TokenClientConfig::new(upstream.uri()).with_call_timeout(Duration::from_millis(200)),
    )?;

    assert!(!client.validate_token("any-token").await);

    Ok(())
}

/// The username operation is consulted only when user-details fails.
#[tokio::test]
async fn test_remote_client_username_falls_back_when_primary_fails() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(USER_DETAILS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path(USERNAME_FROM_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let client = client_for(upstream.uri())?;

    assert_eq!(
        client.username_from_token("any-token").await.as_deref(),
        Some("alice")
    );

    Ok(())
}

/// A primary answer of "invalid token" is final.
#[tokio::test]
async fn test_remote_client_username_no_fallback_on_invalid_token() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(USER_DETAILS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "details": null })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path(USERNAME_FROM_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
        .expect(0)
        .mount(&upstream)
        .await;

    let client = client_for(upstream.uri())?;

    assert!(client.username_from_token("any-token").await.is_none());

    Ok(())
}

/// Both operations failing yields `None`.
#[tokio::test]
async fn test_remote_client_username_both_paths_fail() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&upstream)
        .await;

    let client = client_for(upstream.uri())?;

    assert!(client.username_from_token("any-token").await.is_none());

    Ok(())
}

//! E2E tests for the authorization gate in front of `/api/v1/auth/me`.

use auth_service::clock::ManualClock;
use auth_service::middleware::auth::{
    require_auth, AuthGate, AuthMiddlewareState, AuthenticatedUser, RoleRequirement,
    TokenVerifier,
};
use auth_service::services::token_validator::TokenValidator;
use auth_test_utils::*;
use axum::{body::Body, http::Request, middleware, routing::get, Extension, Router};
use common::token_client::{RemoteTokenClient, TokenClientConfig};
use reqwest::{header, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn get_me(
    server: &TestAuthServer,
    authorization: Option<&str>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/auth/me", server.url()));
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn test_me_with_valid_token_returns_identity() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    // Act
    let response = get_me(&server, Some(&format!("Bearer {token}"))).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["username"].as_str(), Some(TEST_USER_ALICE));
    assert_eq!(body["roles"], serde_json::json!([ROLE_TEACHER]));

    Ok(())
}

#[tokio::test]
async fn test_me_without_header_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = get_me(&server, None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("INVALID_TOKEN"));

    Ok(())
}

#[tokio::test]
async fn test_me_with_wrong_scheme_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let basic = get_me(&server, Some(&format!("Basic {token}"))).await?;
    let bare = get_me(&server, Some(&token)).await?;
    let empty = get_me(&server, Some("Bearer ")).await?;

    assert_eq!(basic.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bare.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(empty.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_me_with_expired_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder().with_ttl(10).spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    server.advance_clock(Duration::from_secs(11));
    let response = get_me(&server, Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_me_with_tampered_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let response = get_me(&server, Some(&format!("Bearer {}", tamper_payload(&token)))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

// ============================================================================
// Role requirements
// ============================================================================

async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> String {
    user.subject
}

/// Router with one route behind a gate requiring any of `roles`.
fn gated_app(verifier: Arc<dyn TokenVerifier>, roles: &[&str]) -> Router {
    let state = Arc::new(AuthMiddlewareState {
        gate: AuthGate::new(verifier).with_requirement(RoleRequirement::any_of(roles.iter().copied())),
    });
    Router::new()
        .route("/admin", get(whoami))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn local_verifier() -> Result<Arc<dyn TokenVerifier>, anyhow::Error> {
    let key = test_verification_key(TEST_SERVER_KEY_SEED, None)?;
    Ok(Arc::new(TokenValidator::new(
        Arc::new(key),
        Arc::new(ManualClock::new(TEST_NOW)),
        300,
    )))
}

async fn call_gated(app: Router, token: &str) -> Result<StatusCode, anyhow::Error> {
    let response = app
        .oneshot(
            Request::get("/admin")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    Ok(response.status())
}

#[tokio::test]
async fn test_gate_missing_role_is_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.issue_token(TEST_USER_BOB, &[ROLE_USER]);

    let status = call_gated(gated_app(local_verifier()?, &[ROLE_ADMIN]), &token).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_gate_any_matching_role_is_allowed() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.issue_token(TEST_USER_CAROL, &[ROLE_ADMIN, ROLE_USER]);

    let status = call_gated(
        gated_app(local_verifier()?, &[ROLE_TEACHER, ROLE_ADMIN]),
        &token,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);

    Ok(())
}

/// A service without the signing key gates through the RPC interface.
#[tokio::test]
async fn test_gate_with_remote_verifier() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let remote: Arc<dyn TokenVerifier> =
        Arc::new(RemoteTokenClient::new(TokenClientConfig::new(server.url()))?);
    let admin_token = server.login_token(TEST_USER_CAROL, TEST_PASSWORD_CAROL).await?;
    let user_token = server.login_token(TEST_USER_BOB, TEST_PASSWORD_BOB).await?;

    // Act
    let allowed = call_gated(gated_app(remote.clone(), &[ROLE_ADMIN]), &admin_token).await?;
    let forbidden = call_gated(gated_app(remote.clone(), &[ROLE_ADMIN]), &user_token).await?;
    let unauthenticated =
        call_gated(gated_app(remote, &[ROLE_ADMIN]), &tamper_payload(&admin_token)).await?;

    // Assert
    assert_eq!(allowed, StatusCode::OK);
    assert_eq!(forbidden, StatusCode::FORBIDDEN);
    assert_eq!(unauthenticated, StatusCode::UNAUTHORIZED);

    Ok(())
}

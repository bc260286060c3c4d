//! E2E tests for the token validation RPC interface.

use auth_test_utils::*;
use common::rpc::*;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

async fn call<B: Serialize, R: DeserializeOwned>(
    server: &TestAuthServer,
    path: &str,
    body: &B,
) -> Result<R, anyhow::Error> {
    let response = reqwest::Client::new()
        .post(format!("{}{}", server.url(), path))
        .json(body)
        .send()
        .await?;
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "{path} must answer 200 for token queries"
    );
    Ok(response.json().await?)
}

fn token_body(token: &str) -> TokenRequest {
    TokenRequest {
        token: token.to_string(),
    }
}

// ============================================================================
// Valid token
// ============================================================================

#[tokio::test]
async fn test_rpc_queries_on_valid_token() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_CAROL, TEST_PASSWORD_CAROL).await?;

    // Act
    let valid: ValidityResponse = call(&server, VALIDATE_TOKEN_PATH, &token_body(&token)).await?;
    let details: UserDetailsResponse = call(&server, USER_DETAILS_PATH, &token_body(&token)).await?;
    let roles: RolesResponse = call(&server, EXTRACT_ROLES_PATH, &token_body(&token)).await?;
    let username: UsernameResponse =
        call(&server, USERNAME_FROM_TOKEN_PATH, &token_body(&token)).await?;
    let has_admin: ValidityResponse = call(
        &server,
        HAS_ROLE_PATH,
        &RoleCheckRequest {
            token: token.clone(),
            role: ROLE_ADMIN.to_string(),
        },
    )
    .await?;
    let has_teacher: ValidityResponse = call(
        &server,
        HAS_ROLE_PATH,
        &RoleCheckRequest {
            token: token.clone(),
            role: ROLE_TEACHER.to_string(),
        },
    )
    .await?;
    let has_any: ValidityResponse = call(
        &server,
        HAS_ANY_ROLE_PATH,
        &AnyRoleCheckRequest {
            token: token.clone(),
            roles: vec![ROLE_TEACHER.to_string(), ROLE_USER.to_string()],
        },
    )
    .await?;
    let belongs: ValidityResponse = call(
        &server,
        VALIDATE_TOKEN_FOR_USERNAME_PATH,
        &UsernameCheckRequest {
            token: token.clone(),
            username: TEST_USER_CAROL.to_string(),
        },
    )
    .await?;

    // Assert
    assert!(valid.valid);
    let details = details.details.ok_or_else(|| anyhow::anyhow!("missing details"))?;
    assert_eq!(details.username, TEST_USER_CAROL);
    assert_eq!(details.issued_at, TEST_NOW);
    assert_eq!(details.expires_at, TEST_NOW + server.ttl_seconds());
    assert_eq!(
        roles.roles.into_iter().collect::<Vec<_>>(),
        vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()]
    );
    assert_eq!(username.username.as_deref(), Some(TEST_USER_CAROL));
    assert!(has_admin.valid);
    assert!(!has_teacher.valid);
    assert!(has_any.valid);
    assert!(belongs.valid);

    Ok(())
}

#[tokio::test]
async fn test_rpc_accepts_bearer_prefixed_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let valid: ValidityResponse =
        call(&server, VALIDATE_TOKEN_PATH, &token_body(&format!("Bearer {token}"))).await?;

    assert!(valid.valid);

    Ok(())
}

#[tokio::test]
async fn test_rpc_has_any_role_with_empty_list_is_false() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let explicit: ValidityResponse = call(
        &server,
        HAS_ANY_ROLE_PATH,
        &AnyRoleCheckRequest {
            token: token.clone(),
            roles: Vec::new(),
        },
    )
    .await?;
    let omitted: ValidityResponse =
        call(&server, HAS_ANY_ROLE_PATH, &json!({ "token": token })).await?;

    assert!(!explicit.valid);
    assert!(!omitted.valid);

    Ok(())
}

#[tokio::test]
async fn test_rpc_validate_for_other_username_is_false() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;

    let belongs: ValidityResponse = call(
        &server,
        VALIDATE_TOKEN_FOR_USERNAME_PATH,
        &UsernameCheckRequest {
            token,
            username: TEST_USER_BOB.to_string(),
        },
    )
    .await?;

    assert!(!belongs.valid);

    Ok(())
}

// ============================================================================
// Invalid token
// ============================================================================

/// Garbage yields `false`, empty and `null`, never an error status.
#[tokio::test]
async fn test_rpc_queries_on_garbage_token_fail_closed() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let garbage = token_body("not.a.token");

    let valid: ValidityResponse = call(&server, VALIDATE_TOKEN_PATH, &garbage).await?;
    let details: UserDetailsResponse = call(&server, USER_DETAILS_PATH, &garbage).await?;
    let roles: RolesResponse = call(&server, EXTRACT_ROLES_PATH, &garbage).await?;
    let username: UsernameResponse = call(&server, USERNAME_FROM_TOKEN_PATH, &garbage).await?;

    assert!(!valid.valid);
    assert!(details.details.is_none());
    assert!(roles.roles.is_empty());
    assert!(username.username.is_none());

    Ok(())
}

#[tokio::test]
async fn test_rpc_empty_token_is_invalid() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let valid: ValidityResponse = call(&server, VALIDATE_TOKEN_PATH, &token_body("")).await?;

    assert!(!valid.valid);

    Ok(())
}

// ============================================================================
// Authenticate
// ============================================================================

#[tokio::test]
async fn test_rpc_authenticate_success() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response: LoginResponse = call(
        &server,
        AUTHENTICATE_PATH,
        &json!({ "username": TEST_USER_BOB, "password": TEST_PASSWORD_BOB }),
    )
    .await?;

    assert_eq!(response.username, TEST_USER_BOB);
    response.token.assert_roles(&[ROLE_USER]);

    Ok(())
}

#[tokio::test]
async fn test_rpc_authenticate_accepts_user_name_alias() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response: LoginResponse = call(
        &server,
        AUTHENTICATE_PATH,
        &json!({ "userName": TEST_USER_ALICE, "password": TEST_PASSWORD_ALICE }),
    )
    .await?;

    assert_eq!(response.username, TEST_USER_ALICE);

    Ok(())
}

#[tokio::test]
async fn test_rpc_authenticate_failure_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}{}", server.url(), AUTHENTICATE_PATH))
        .json(&json!({ "username": TEST_USER_BOB, "password": "wrong" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

//! Token validation RPC interface.
//!
//! JSON over HTTP POST for services that do not hold the signing key. Every
//! query answers 200: an invalid token yields `false`, an empty set or
//! `null`. Tokens may carry a `Bearer ` prefix.
//!
//! `authenticate` is the one operation that answers 401, since it checks
//! credentials rather than a token.

use crate::errors::AuthError;
use crate::handlers::auth_handler::AppState;
use axum::{extract::State, Json};
use common::jwt::strip_bearer;
use common::rpc::{
    AnyRoleCheckRequest, CredentialsRequest, LoginResponse, RoleCheckRequest, RolesResponse,
    TokenRequest, UserDetailsResponse, UsernameCheckRequest, UsernameResponse, ValidityResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// POST /api/v1/token/authenticate
#[instrument(name = "auth.rpc.authenticate", skip_all)]
pub async fn handle_authenticate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let issued = state
        .issuer
        .authenticate(&payload.username, &payload.password)
        .await?;
    Ok(Json(LoginResponse::from(issued)))
}

/// POST /api/v1/token/validate
#[instrument(name = "auth.rpc.validate", skip_all)]
pub async fn handle_validate_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Json<ValidityResponse> {
    Json(ValidityResponse {
        valid: state.validator.is_valid(strip_bearer(&payload.token)),
    })
}

/// POST /api/v1/token/user-details
#[instrument(name = "auth.rpc.user_details", skip_all)]
pub async fn handle_user_details(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Json<UserDetailsResponse> {
    Json(UserDetailsResponse {
        details: state.validator.user_details(strip_bearer(&payload.token)),
    })
}

/// POST /api/v1/token/roles
#[instrument(name = "auth.rpc.roles", skip_all)]
pub async fn handle_extract_roles(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Json<RolesResponse> {
    Json(RolesResponse {
        roles: state.validator.roles(strip_bearer(&payload.token)),
    })
}

/// POST /api/v1/token/has-role
#[instrument(name = "auth.rpc.has_role", skip_all)]
pub async fn handle_has_role(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RoleCheckRequest>,
) -> Json<ValidityResponse> {
    Json(ValidityResponse {
        valid: state
            .validator
            .has_role(strip_bearer(&payload.token), &payload.role),
    })
}

/// POST /api/v1/token/has-any-role
#[instrument(name = "auth.rpc.has_any_role", skip_all)]
pub async fn handle_has_any_role(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnyRoleCheckRequest>,
) -> Json<ValidityResponse> {
    Json(ValidityResponse {
        valid: state
            .validator
            .has_any_role(strip_bearer(&payload.token), &payload.roles),
    })
}

/// POST /api/v1/token/validate-for-username
#[instrument(name = "auth.rpc.validate_for_username", skip_all)]
pub async fn handle_validate_token_for_username(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UsernameCheckRequest>,
) -> Json<ValidityResponse> {
    Json(ValidityResponse {
        valid: state
            .validator
            .belongs_to(strip_bearer(&payload.token), &payload.username),
    })
}

/// POST /api/v1/token/username
#[instrument(name = "auth.rpc.username", skip_all)]
pub async fn handle_username_from_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Json<UsernameResponse> {
    Json(UsernameResponse {
        username: state.validator.username(strip_bearer(&payload.token)),
    })
}

use crate::errors::AuthError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, MeResponse};
use crate::services::token_issuer::TokenIssuer;
use crate::services::token_validator::TokenValidator;
use axum::{
    extract::State,
    Extension, Json,
};
use common::rpc::LoginResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::instrument;

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub issuer: TokenIssuer,
    pub validator: TokenValidator,
}

/// Handle login
///
/// POST /api/v1/auth/login
///
/// Unknown user, wrong password and an unreachable directory all answer
/// 401 `INVALID_CREDENTIALS`.
#[instrument(name = "auth.login", skip_all)]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let issued = state
        .issuer
        .authenticate(&payload.username, &payload.password)
        .await?;

    Ok(Json(LoginResponse::from(issued)))
}

/// Identity of the caller that passed the gate.
///
/// GET /api/v1/auth/me
pub async fn handle_me(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        username: user.subject,
        roles: user.roles,
    })
}

/// Liveness probe.
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus text exposition.
///
/// GET /metrics
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

//! HTTP routes for the token service.

use crate::handlers::auth_handler::{self, AppState};
use crate::handlers::rpc_handler;
use crate::middleware::auth::{require_auth, AuthGate, AuthMiddlewareState, TokenVerifier};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::rpc::{
    AUTHENTICATE_PATH, EXTRACT_ROLES_PATH, HAS_ANY_ROLE_PATH, HAS_ROLE_PATH,
    USERNAME_FROM_TOKEN_PATH, USER_DETAILS_PATH, VALIDATE_TOKEN_FOR_USERNAME_PATH,
    VALIDATE_TOKEN_PATH,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Build the application routes.
///
/// - `/health`, `/metrics` - public, unversioned
/// - `/api/v1/auth/login` - credential exchange
/// - `/api/v1/token/*` - token validation RPC interface
/// - `/api/v1/auth/me` - behind the authorization gate
/// - TraceLayer for request logging and a 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let verifier: Arc<dyn TokenVerifier> = Arc::new(state.validator.clone());
    let auth_state = Arc::new(AuthMiddlewareState {
        gate: AuthGate::new(verifier),
    });

    let public_routes = Router::new()
        .route("/health", get(auth_handler::health_check))
        .route("/api/v1/auth/login", post(auth_handler::handle_login))
        .route(AUTHENTICATE_PATH, post(rpc_handler::handle_authenticate))
        .route(VALIDATE_TOKEN_PATH, post(rpc_handler::handle_validate_token))
        .route(USER_DETAILS_PATH, post(rpc_handler::handle_user_details))
        .route(EXTRACT_ROLES_PATH, post(rpc_handler::handle_extract_roles))
        .route(HAS_ROLE_PATH, post(rpc_handler::handle_has_role))
        .route(HAS_ANY_ROLE_PATH, post(rpc_handler::handle_has_any_role))
        .route(
            VALIDATE_TOKEN_FOR_USERNAME_PATH,
            post(rpc_handler::handle_validate_token_for_username),
        )
        .route(
            USERNAME_FROM_TOKEN_PATH,
            post(rpc_handler::handle_username_from_token),
        )
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(auth_handler::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/auth/me", get(auth_handler::handle_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

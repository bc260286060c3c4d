//! Authorization gate for HTTP handlers.
//!
//! Each request walks `NoToken -> Extracted -> Verified | Rejected`:
//! - no header, a non-UTF-8 header, a missing `Bearer ` prefix, or an empty
//!   token is `Rejected(Unauthenticated)`
//! - a token the verifier refuses is `Rejected(Unauthenticated)`
//! - a verified caller without a required role is `Rejected(Forbidden)`
//!
//! The verifier is either the local [`TokenValidator`] or a
//! [`RemoteTokenClient`] for services that do not hold the signing key.

use crate::errors::AuthError;
use crate::observability::metrics::record_gate_decision;
use crate::services::token_validator::TokenValidator;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::Response,
};
use common::jwt::BEARER_PREFIX;
use common::token_client::RemoteTokenClient;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Verifiers
// ============================================================================

/// Verified caller, stored in request extensions for downstream handlers.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub roles: BTreeSet<String>,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("subject", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Turns a bearer token into a caller identity, or refuses it.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Option<AuthenticatedUser>;
}

#[async_trait]
impl TokenVerifier for TokenValidator {
    async fn verify_token(&self, token: &str) -> Option<AuthenticatedUser> {
        self.claims(token).map(|c| AuthenticatedUser {
            subject: c.subject,
            roles: c.roles,
        })
    }
}

#[async_trait]
impl TokenVerifier for RemoteTokenClient {
    async fn verify_token(&self, token: &str) -> Option<AuthenticatedUser> {
        self.user_details(token).await.map(|d| AuthenticatedUser {
            subject: d.username,
            roles: d.roles.into_iter().collect(),
        })
    }
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    Unauthenticated,
    Forbidden,
}

/// Outcome of one pass through the gate.
///
/// A forbidden caller is still authenticated: `subject` and `roles` are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub authenticated: bool,
    pub subject: Option<String>,
    pub roles: BTreeSet<String>,
    pub reason: Option<DenialReason>,
}

impl AuthDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.reason.is_none()
    }

    /// Bounded label for the `outcome` metric dimension.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self.reason {
            None => "allowed",
            Some(DenialReason::Unauthenticated) => "unauthenticated",
            Some(DenialReason::Forbidden) => "forbidden",
        }
    }
}

/// Role policy applied after the token is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any verified caller.
    #[default]
    Authenticated,
    /// At least one of the listed roles. An empty list admits nobody.
    AnyOf(Vec<String>),
}

impl RoleRequirement {
    pub fn role(role: impl Into<String>) -> Self {
        Self::AnyOf(vec![role.into()])
    }

    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(roles.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn is_satisfied_by(&self, roles: &BTreeSet<String>) -> bool {
        match self {
            RoleRequirement::Authenticated => true,
            RoleRequirement::AnyOf(required) => required.iter().any(|r| roles.contains(r)),
        }
    }

    #[must_use]
    pub fn required_roles(&self) -> Vec<String> {
        match self {
            RoleRequirement::Authenticated => Vec::new(),
            RoleRequirement::AnyOf(required) => required.clone(),
        }
    }
}

// ============================================================================
// Gate
// ============================================================================

enum GateState<'a> {
    NoToken,
    Extracted(&'a str),
    Verified(AuthenticatedUser),
    Rejected {
        reason: DenialReason,
        user: Option<AuthenticatedUser>,
    },
}

impl GateState<'_> {
    fn is_terminal(&self) -> bool {
        matches!(self, GateState::Verified(_) | GateState::Rejected { .. })
    }

    fn into_decision(self) -> AuthDecision {
        match self {
            GateState::Verified(user) => AuthDecision {
                authenticated: true,
                subject: Some(user.subject),
                roles: user.roles,
                reason: None,
            },
            GateState::Rejected {
                reason,
                user: Some(user),
            } => AuthDecision {
                authenticated: true,
                subject: Some(user.subject),
                roles: user.roles,
                reason: Some(reason),
            },
            GateState::Rejected { reason, user: None } => AuthDecision {
                authenticated: false,
                subject: None,
                roles: BTreeSet::new(),
                reason: Some(reason),
            },
            GateState::NoToken | GateState::Extracted(_) => AuthDecision {
                authenticated: false,
                subject: None,
                roles: BTreeSet::new(),
                reason: Some(DenialReason::Unauthenticated),
            },
        }
    }
}

/// Stateless per-request policy: one verifier, one role requirement.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    requirement: RoleRequirement,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            requirement: RoleRequirement::Authenticated,
        }
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: RoleRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    #[must_use]
    pub fn requirement(&self) -> &RoleRequirement {
        &self.requirement
    }

    /// Run the gate over an `Authorization` header value.
    pub async fn decide(&self, authorization: Option<&HeaderValue>) -> AuthDecision {
        let mut state = GateState::NoToken;
        while !state.is_terminal() {
            state = self.step(state, authorization).await;
        }

        let decision = state.into_decision();
        tracing::debug!(
            target: "auth.gate",
            outcome = decision.outcome(),
            "Gate decision"
        );
        decision
    }

    async fn step<'a>(
        &self,
        state: GateState<'a>,
        authorization: Option<&'a HeaderValue>,
    ) -> GateState<'a> {
        match state {
            GateState::NoToken => match extract_bearer_token(authorization) {
                Some(token) => GateState::Extracted(token),
                None => GateState::Rejected {
                    reason: DenialReason::Unauthenticated,
                    user: None,
                },
            },
            GateState::Extracted(token) => match self.verifier.verify_token(token).await {
                Some(user) if self.requirement.is_satisfied_by(&user.roles) => {
                    GateState::Verified(user)
                }
                Some(user) => GateState::Rejected {
                    reason: DenialReason::Forbidden,
                    user: Some(user),
                },
                None => GateState::Rejected {
                    reason: DenialReason::Unauthenticated,
                    user: None,
                },
            },
            terminal => terminal,
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
///
/// `None` for a missing or non-UTF-8 header, another scheme, or an empty token.
pub fn extract_bearer_token(header: Option<&HeaderValue>) -> Option<&str> {
    header?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware state wrapping the gate
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub gate: AuthGate,
}

/// Authentication middleware.
///
/// 401 for an unauthenticated caller, 403 for a missing role. On success the
/// [`AuthenticatedUser`] is stored in request extensions.
pub async fn require_auth(
    State(state): State<Arc<AuthMiddlewareState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let decision = state.gate.decide(req.headers().get(AUTHORIZATION)).await;
    record_gate_decision(decision.outcome());

    match (decision.reason, decision.subject) {
        (None, Some(subject)) => {
            req.extensions_mut().insert(AuthenticatedUser {
                subject,
                roles: decision.roles,
            });
            Ok(next.run(req).await)
        }
        (Some(DenialReason::Forbidden), _) => Err(AuthError::Forbidden {
            required: state.gate.requirement().required_roles(),
        }),
        _ => Err(AuthError::InvalidToken(
            "The access token is invalid or expired".to_string(),
        )),
    }
}

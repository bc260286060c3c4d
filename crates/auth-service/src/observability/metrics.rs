//! Metrics definitions for the token service
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `outcome`: 3 values (allowed, unauthenticated, forbidden)
//! - `reason`: 2 values (rejected, internal)
//!
//! # Enumeration
//!
//! `/metrics` is unauthenticated. Labels must not separate an unknown user
//! from a wrong password, nor an expired token from a forged one. The
//! fine-grained reason goes to the `auth.issuer` and `auth.validator` logs.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle that renders
/// `/metrics`.
///
/// Must be called before any metrics are recorded. Issuance buckets cover
/// the bcrypt cost range (tens to hundreds of milliseconds).
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("auth_token_issuance_duration_seconds".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.200, 0.350, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `auth_token_issuance_duration_seconds`, `auth_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("auth_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("auth_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record why an issuance attempt failed
///
/// Metric: `auth_token_issuance_failures_total`
/// Labels: `reason`
///
/// `reason` is `rejected` for every credential or lookup failure and
/// `internal` when signing failed.
pub fn record_issuance_failure(reason: &str) {
    counter!("auth_token_issuance_failures_total", "reason" => reason.to_string()).increment(1);
}

/// Record token validation result
///
/// Metric: `auth_token_validations_total`
/// Labels: `status`
pub fn record_token_validation(status: &str) {
    counter!("auth_token_validations_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Gate Metrics
// ============================================================================

/// Record an authorization gate decision
///
/// Metric: `auth_gate_decisions_total`
/// Labels: `outcome`
pub fn record_gate_decision(outcome: &str) {
    counter!("auth_gate_decisions_total", "outcome" => outcome.to_string()).increment(1);
}

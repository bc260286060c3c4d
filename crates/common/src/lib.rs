//! Shared token contract for the token service and its consumers.

#![warn(clippy::pedantic)]

/// Claims, size and skew limits, token logging helpers
pub mod jwt;

/// RPC paths and request/response bodies
pub mod rpc;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Fail-closed client for services that do not hold the signing key
pub mod token_client;

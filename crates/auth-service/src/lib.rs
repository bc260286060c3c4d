//! Token Service Library
//!
//! Issues signed bearer tokens for verified credentials and answers
//! validation queries about them, locally or over the RPC interface.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `clock` - Injectable time source
//! - `crypto` - Claims codec and password hashing
//! - `directory` - Identity lookup (remote user service, static, fallback)
//! - `errors` - Client-visible error type
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization gate
//! - `models` - Request/response bodies local to this service
//! - `observability` - Metrics and log correlation helpers
//! - `routes` - Router assembly
//! - `services` - Token issuer and validator

pub mod clock;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

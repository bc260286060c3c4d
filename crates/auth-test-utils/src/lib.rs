//! # Auth Test Utilities
//!
//! Shared test utilities for the token service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed signing secrets, cheap bcrypt hashes)
//! - Test data builders (TestTokenBuilder, tampered and unsigned tokens)
//! - Server test harness (TestAuthServer for E2E tests)
//! - Fixed test identities (usernames, passwords, roles)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestAuthServer::builder().with_ttl(10).spawn().await?;
//!
//!     let token = server.login_token(TEST_USER_ALICE, TEST_PASSWORD_ALICE).await?;
//!
//!     token.assert_valid_jwt()
//!          .assert_for_subject(TEST_USER_ALICE)
//!          .assert_has_role(ROLE_TEACHER);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;

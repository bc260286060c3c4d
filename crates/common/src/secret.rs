//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Passwords, signing secrets, and password
//! hashes travel through the token service wrapped in these types; their
//! `Debug` output is redacted and the memory is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credential {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let cred = Credential {
//!     username: "alice".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{cred:?}").contains("hunter2"));
//! assert_eq!(cred.password.expose_secret(), "hunter2");
//! ```
//!
//! Use `SecretString` for passwords and bcrypt hashes, `SecretBox<[u8]>` for
//! raw key material such as the HMAC signing secret.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

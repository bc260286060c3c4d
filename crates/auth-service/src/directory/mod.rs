//! Identity lookup.
//!
//! The token service never stores users. It asks an [`IdentityProvider`] for
//! the password hash and roles of a username at login time.
//!
//! - [`StaticDirectory`] - in-memory records (emergency account, tests)
//! - [`HttpUserDirectory`] - the user service over HTTP
//! - [`FallbackDirectory`] - primary, then secondary when the primary fails

mod http;

pub use http::HttpUserDirectory;

use crate::config::EmergencyAccount;
use async_trait::async_trait;
use common::secret::SecretString;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Roles granted to the emergency account.
pub const EMERGENCY_ROLES: [&str; 2] = ["ADMIN", "USER"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Identity not found")]
    NotFound,

    #[error("Identity lookup unavailable: {0}")]
    Unavailable(String),
}

/// Credentials and roles of one user.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub username: String,
    /// bcrypt hash.
    pub password_hash: SecretString,
    pub roles: BTreeSet<String>,
}

impl IdentityRecord {
    pub fn new<I, S>(username: impl Into<String>, password_hash: SecretString, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            password_hash,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Source of identity records.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up a user by exact username.
    ///
    /// # Errors
    ///
    /// - `LookupError::NotFound` - no such user
    /// - `LookupError::Unavailable` - the backing store could not answer
    async fn find_by_username(&self, username: &str) -> Result<IdentityRecord, LookupError>;
}

// ============================================================================
// StaticDirectory
// ============================================================================

/// Fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    records: HashMap<String, IdentityRecord>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory containing only the emergency account.
    #[must_use]
    pub fn emergency(account: &EmergencyAccount) -> Self {
        Self::new().with_record(IdentityRecord::new(
            account.username.clone(),
            account.password_hash.clone(),
            EMERGENCY_ROLES,
        ))
    }

    /// Add or replace a record.
    #[must_use]
    pub fn with_record(mut self, record: IdentityRecord) -> Self {
        self.records.insert(record.username.clone(), record);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticDirectory {
    async fn find_by_username(&self, username: &str) -> Result<IdentityRecord, LookupError> {
        self.records
            .get(username)
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}

// ============================================================================
// FallbackDirectory
// ============================================================================

/// Asks `primary`; if it fails or does not know the user, asks `secondary`.
///
/// When both miss, the primary's error is returned so an outage still reads
/// as `Unavailable` in the logs.
#[derive(Clone)]
pub struct FallbackDirectory {
    primary: Arc<dyn IdentityProvider>,
    secondary: Arc<dyn IdentityProvider>,
}

impl FallbackDirectory {
    pub fn new(primary: Arc<dyn IdentityProvider>, secondary: Arc<dyn IdentityProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl IdentityProvider for FallbackDirectory {
    #[instrument(skip_all)]
    async fn find_by_username(&self, username: &str) -> Result<IdentityRecord, LookupError> {
        let primary_err = match self.primary.find_by_username(username).await {
            Ok(record) => return Ok(record),
            Err(e) => e,
        };

        match self.secondary.find_by_username(username).await {
            Ok(record) => {
                tracing::warn!(
                    target: "auth.directory",
                    primary_error = %primary_err,
                    "Identity served by fallback directory"
                );
                Ok(record)
            }
            Err(_) => Err(primary_err),
        }
    }
}

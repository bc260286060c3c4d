use super::{IdentityProvider, IdentityRecord, LookupError};
use async_trait::async_trait;
use common::secret::SecretString;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Connection timeout for the user service.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// User record as served by the user service.
#[derive(Deserialize)]
struct UserRecordResponse {
    username: String,
    #[serde(alias = "password")]
    password_hash: String,
    #[serde(default = "default_roles")]
    roles: Vec<String>,
}

fn default_roles() -> Vec<String> {
    vec!["USER".to_string()]
}

/// Identity lookups against the user service.
///
/// `GET {base}/api/v1/users/by-name/{username}`, one attempt per lookup,
/// bounded by the configured timeout. `404` means the user does not exist;
/// everything else that is not a `2xx` is treated as an outage.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpUserDirectory {
    /// # Errors
    ///
    /// Returns `LookupError::Unavailable` if the URL cannot be used as a base
    /// or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LookupError::Unavailable(format!("Invalid user directory URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::Unavailable(
                "User directory URL cannot be a base".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| LookupError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn user_url(&self, username: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LookupError::Unavailable("User directory URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "v1", "users", "by-name", username]);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for HttpUserDirectory {
    #[instrument(skip_all)]
    async fn find_by_username(&self, username: &str) -> Result<IdentityRecord, LookupError> {
        let url = self.user_url(username)?;

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::warn!(target: "auth.directory", error = %e, "User directory request failed");
            LookupError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            tracing::warn!(target: "auth.directory", status = %status, "User directory returned error status");
            return Err(LookupError::Unavailable(format!("Unexpected status: {}", status)));
        }

        let body: UserRecordResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: "auth.directory", error = %e, "Failed to parse user record");
            LookupError::Unavailable(format!("Invalid user record: {}", e))
        })?;

        // The directory must answer for the user that was asked for.
        if body.username != username {
            tracing::warn!(target: "auth.directory", "User directory returned a different user");
            return Err(LookupError::NotFound);
        }

        Ok(IdentityRecord::new(
            body.username,
            SecretString::from(body.password_hash),
            body.roles,
        ))
    }
}

//! Test server harness for E2E testing
//!
//! Provides TestAuthServer for spawning real token service instances in
//! tests. The clock is a [`ManualClock`] so expiry can be driven without
//! sleeping.

use crate::crypto_fixtures::{test_password_hash, test_signing_key, test_signing_secret};
use crate::test_ids::{TEST_NOW, TEST_USERS};
use crate::token_builders::TestTokenBuilder;
use auth_service::clock::{Clock, ManualClock};
use auth_service::config::{DEFAULT_JWT_CLOCK_SKEW_SECONDS, DEFAULT_TOKEN_TTL_SECONDS};
use auth_service::crypto::SigningKey;
use auth_service::directory::{IdentityProvider, IdentityRecord, StaticDirectory};
use auth_service::handlers::auth_handler::AppState;
use auth_service::routes;
use auth_service::services::token_issuer::TokenIssuer;
use auth_service::services::token_validator::TokenValidator;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default signing secret seed for the harness.
pub const TEST_SERVER_KEY_SEED: u8 = 1;

/// In-memory directory holding every user in [`TEST_USERS`].
pub fn test_directory() -> Result<StaticDirectory, anyhow::Error> {
    TEST_USERS
        .iter()
        .try_fold(StaticDirectory::new(), |dir, (username, password, roles)| {
            let hash = test_password_hash(password)?;
            Ok(dir.with_record(IdentityRecord::new(*username, hash, roles.iter().copied())))
        })
}

/// Options for [`TestAuthServer`].
pub struct TestAuthServerBuilder {
    ttl_seconds: i64,
    clock_skew_seconds: i64,
    kid: Option<String>,
    directory: Option<Arc<dyn IdentityProvider>>,
}

impl TestAuthServerBuilder {
    fn new() -> Self {
        Self {
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            clock_skew_seconds: DEFAULT_JWT_CLOCK_SKEW_SECONDS,
            kid: None,
            directory: None,
        }
    }

    /// Token lifetime in seconds
    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Allowed issued-at clock skew in seconds
    pub fn with_clock_skew(mut self, seconds: i64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    /// `kid` stamped on issued tokens and required on verified ones
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Replace the default [`test_directory`]
    pub fn with_directory(mut self, directory: Arc<dyn IdentityProvider>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Spawn the server
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Sign with the seed-[`TEST_SERVER_KEY_SEED`] test secret
    /// - Start its clock at [`TEST_NOW`]
    pub async fn spawn(self) -> Result<TestAuthServer, anyhow::Error> {
        let directory: Arc<dyn IdentityProvider> = match self.directory {
            Some(directory) => directory,
            None => Arc::new(test_directory()?),
        };
        let signing_key = Arc::new(test_signing_key(TEST_SERVER_KEY_SEED, self.kid.as_deref())?);
        let clock = Arc::new(ManualClock::new(TEST_NOW));

        let state = Arc::new(AppState {
            issuer: TokenIssuer::new(
                directory,
                signing_key.clone(),
                clock.clone(),
                self.ttl_seconds,
            ),
            validator: TokenValidator::new(
                Arc::new(signing_key.verification_key()),
                clock.clone(),
                self.clock_skew_seconds,
            ),
        });

        // Note: This may fail if already installed in the test process.
        // In that case, we create a new recorder without installing it globally.
        let metrics_handle = match routes::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                let recorder = PrometheusBuilder::new().build_recorder();
                recorder.handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestAuthServer {
            addr,
            clock,
            signing_key,
            kid: self.kid,
            ttl_seconds: self.ttl_seconds,
            _handle: handle,
        })
    }
}

/// Test harness for spawning the token service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_e2e() -> Result<()> {
///     let server = TestAuthServer::spawn().await?;
///     let response = server.login("alice", "alice-password").await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    clock: Arc<ManualClock>,
    signing_key: Arc<SigningKey>,
    kid: Option<String>,
    ttl_seconds: i64,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    pub fn builder() -> TestAuthServerBuilder {
        TestAuthServerBuilder::new()
    }

    /// Spawn with default options
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::builder().spawn().await
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current server time (Unix seconds)
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Move the server clock forward
    pub fn advance_clock(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Raw secret the server signs with
    pub fn signing_secret(&self) -> Vec<u8> {
        test_signing_secret(TEST_SERVER_KEY_SEED)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// POST /api/v1/auth/login
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let response = reqwest::Client::new()
            .post(format!("{}/api/v1/auth/login", self.url()))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        Ok(response)
    }

    /// Log in and return the token, failing on any non-200 answer
    pub async fn login_token(&self, username: &str, password: &str) -> Result<String, anyhow::Error> {
        let response = self.login(username, password).await?;
        if !response.status().is_success() {
            anyhow::bail!("Login failed with status {}", response.status());
        }
        let body: serde_json::Value = response.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Login response has no token"))
    }

    /// Sign a token directly, issued at the server's current time
    pub fn issue_token(&self, username: &str, roles: &[&str]) -> String {
        let mut builder = TestTokenBuilder::new()
            .for_user(username)
            .with_roles(roles)
            .issued_at(self.now())
            .expires_in(self.ttl_seconds);
        if let Some(kid) = &self.kid {
            builder = builder.with_kid(kid);
        }
        builder.sign(&self.signing_secret())
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}

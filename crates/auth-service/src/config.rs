use base64::{engine::general_purpose, Engine as _};
use common::secret::{SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Minimum HMAC signing secret length in bytes (HS256 key size).
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Default token lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// Maximum token lifetime (24 hours).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Default clock skew tolerance for `iat` validation (5 minutes).
pub const DEFAULT_JWT_CLOCK_SKEW_SECONDS: i64 = 300;

/// Maximum clock skew tolerance (10 minutes).
pub const MAX_JWT_CLOCK_SKEW_SECONDS: i64 = 600;

/// Default user directory call timeout.
pub const DEFAULT_USER_DIRECTORY_TIMEOUT_MS: u64 = 5000;

/// Default bcrypt cost factor (~200ms per hash).
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost factor.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum bcrypt cost factor.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Break-glass account used when the user directory is unreachable.
#[derive(Debug)]
pub struct EmergencyAccount {
    pub username: String,
    /// bcrypt hash of the account password.
    pub password_hash: SecretString,
}

/// Service configuration.
///
/// Secret material is held in `secrecy` types, so the derived `Debug` is
/// safe to log.
#[derive(Debug)]
pub struct Config {
    pub bind_address: String,
    /// Raw HS256 signing secret.
    pub jwt_secret: SecretBox<[u8]>,
    /// Optional key identifier placed in the token header.
    pub jwt_key_id: Option<String>,
    pub token_ttl_seconds: i64,
    pub jwt_clock_skew_seconds: i64,
    /// Base URL of the user service. `None` serves only the emergency account.
    pub user_directory_url: Option<String>,
    pub user_directory_timeout: Duration,
    pub emergency_account: Option<EmergencyAccount>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid token TTL: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid JWT clock skew: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid user directory setting: {0}")]
    InvalidUserDirectory(String),

    #[error("EMERGENCY_USERNAME and EMERGENCY_PASSWORD_HASH must be set together")]
    IncompleteEmergencyAccount,

    #[error("EMERGENCY_PASSWORD_HASH is not a bcrypt hash")]
    InvalidEmergencyPasswordHash,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8082".to_string());

        let secret_base64 = vars
            .get("AUTH_JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_JWT_SECRET".to_string()))?;

        let secret = general_purpose::STANDARD
            .decode(secret_base64.trim())
            .map_err(ConfigError::Base64Error)?;

        if secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "Expected at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                secret.len()
            )));
        }

        let jwt_key_id = vars
            .get("AUTH_JWT_KEY_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let token_ttl_seconds = parse_token_ttl(vars)?;
        let jwt_clock_skew_seconds = parse_clock_skew(vars)?;

        let user_directory_url = vars
            .get("USER_DIRECTORY_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        if let Some(url) = &user_directory_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUserDirectory(format!(
                    "USER_DIRECTORY_URL must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }

        let user_directory_timeout = match vars.get("USER_DIRECTORY_TIMEOUT_MS") {
            Some(value) => {
                let ms: u64 = value.parse().map_err(|e| {
                    ConfigError::InvalidUserDirectory(format!(
                        "USER_DIRECTORY_TIMEOUT_MS must be a positive integer, got '{}': {}",
                        value, e
                    ))
                })?;
                if ms == 0 {
                    return Err(ConfigError::InvalidUserDirectory(
                        "USER_DIRECTORY_TIMEOUT_MS must be greater than 0".to_string(),
                    ));
                }
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_USER_DIRECTORY_TIMEOUT_MS),
        };

        let emergency_account = parse_emergency_account(vars)?;

        Ok(Config {
            bind_address,
            jwt_secret: SecretBox::new(secret.into_boxed_slice()),
            jwt_key_id,
            token_ttl_seconds,
            jwt_clock_skew_seconds,
            user_directory_url,
            user_directory_timeout,
            emergency_account,
        })
    }
}

fn parse_token_ttl(vars: &HashMap<String, String>) -> Result<i64, ConfigError> {
    let Some(value) = vars.get("AUTH_TOKEN_TTL_SECONDS") else {
        return Ok(DEFAULT_TOKEN_TTL_SECONDS);
    };

    let ttl: i64 = value.parse().map_err(|e| {
        ConfigError::InvalidTokenTtl(format!(
            "AUTH_TOKEN_TTL_SECONDS must be a positive integer, got '{}': {}",
            value, e
        ))
    })?;

    if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&ttl) {
        return Err(ConfigError::InvalidTokenTtl(format!(
            "AUTH_TOKEN_TTL_SECONDS must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_SECONDS, ttl
        )));
    }

    Ok(ttl)
}

fn parse_clock_skew(vars: &HashMap<String, String>) -> Result<i64, ConfigError> {
    let Some(value) = vars.get("AUTH_JWT_CLOCK_SKEW_SECONDS") else {
        return Ok(DEFAULT_JWT_CLOCK_SKEW_SECONDS);
    };

    let skew: i64 = value.parse().map_err(|e| {
        ConfigError::InvalidClockSkew(format!(
            "AUTH_JWT_CLOCK_SKEW_SECONDS must be a non-negative integer, got '{}': {}",
            value, e
        ))
    })?;

    if !(0..=MAX_JWT_CLOCK_SKEW_SECONDS).contains(&skew) {
        return Err(ConfigError::InvalidClockSkew(format!(
            "AUTH_JWT_CLOCK_SKEW_SECONDS must be between 0 and {}, got {}",
            MAX_JWT_CLOCK_SKEW_SECONDS, skew
        )));
    }

    Ok(skew)
}

fn parse_emergency_account(
    vars: &HashMap<String, String>,
) -> Result<Option<EmergencyAccount>, ConfigError> {
    let username = vars
        .get("EMERGENCY_USERNAME")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    let password_hash = vars
        .get("EMERGENCY_PASSWORD_HASH")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    match (username, password_hash) {
        (None, None) => Ok(None),
        (Some(username), Some(hash)) => {
            hash.parse::<bcrypt::HashParts>()
                .map_err(|_| ConfigError::InvalidEmergencyPasswordHash)?;
            Ok(Some(EmergencyAccount {
                username: username.to_string(),
                password_hash: SecretString::from(hash.to_string()),
            }))
        }
        _ => Err(ConfigError::IncompleteEmergencyAccount),
    }
}

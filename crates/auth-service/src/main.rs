use auth_service::clock::{Clock, SystemClock};
use auth_service::config::{Config, DEFAULT_BCRYPT_COST};
use auth_service::crypto::{self, SigningKey};
use auth_service::directory::{
    FallbackDirectory, HttpUserDirectory, IdentityProvider, StaticDirectory,
};
use auth_service::handlers::auth_handler::AppState;
use auth_service::routes;
use auth_service::services::token_issuer::TokenIssuer;
use auth_service::services::token_validator::TokenValidator;
use common::secret::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("hash-password") {
        return print_password_hash();
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        token_ttl_seconds = config.token_ttl_seconds,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let signing_key = Arc::new(SigningKey::from_config(&config).map_err(|e| {
        error!("Invalid signing key: {}", e);
        e
    })?);
    let directory = build_directory(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = Arc::new(AppState {
        issuer: TokenIssuer::new(
            directory,
            signing_key.clone(),
            clock.clone(),
            config.token_ttl_seconds,
        ),
        validator: TokenValidator::new(
            Arc::new(signing_key.verification_key()),
            clock,
            config.jwt_clock_skew_seconds,
        ),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Token service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Remote user directory, the emergency account, or both with the emergency
/// account consulted when the remote directory misses or fails.
fn build_directory(
    config: &Config,
) -> Result<Arc<dyn IdentityProvider>, Box<dyn std::error::Error>> {
    let emergency = config
        .emergency_account
        .as_ref()
        .map(|account| Arc::new(StaticDirectory::emergency(account)) as Arc<dyn IdentityProvider>);

    let remote = match &config.user_directory_url {
        Some(url) => {
            let directory = HttpUserDirectory::new(url, config.user_directory_timeout)
                .map_err(|e| {
                    error!("Failed to build user directory client: {}", e);
                    e
                })?;
            Some(Arc::new(directory) as Arc<dyn IdentityProvider>)
        }
        None => None,
    };

    Ok(match (remote, emergency) {
        (Some(remote), Some(emergency)) => {
            info!("Using remote user directory with emergency account fallback");
            Arc::new(FallbackDirectory::new(remote, emergency))
        }
        (Some(remote), None) => {
            info!("Using remote user directory");
            remote
        }
        (None, Some(emergency)) => {
            warn!("No user directory configured; only the emergency account can log in");
            emergency
        }
        (None, None) => {
            warn!("No user directory or emergency account configured; every login will fail");
            Arc::new(StaticDirectory::new())
        }
    })
}

/// `auth-service hash-password`: read a password from stdin and print its
/// bcrypt hash, suitable for `EMERGENCY_PASSWORD_HASH`.
fn print_password_hash() -> Result<(), Box<dyn std::error::Error>> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = SecretString::from(line.trim_end_matches(['\r', '\n']).to_string());

    let hash = crypto::hash_password(&password, DEFAULT_BCRYPT_COST)?;
    println!("{}", hash.expose_secret());
    Ok(())
}

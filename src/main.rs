//! Kaspa Arena Auth Server
//!
//! Serves the wallet authentication API used by the game front end.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use arena_auth::auth::AuthService;
use arena_auth::clock::SystemClock;
use arena_auth::config::Config;
use arena_auth::middleware::RateLimiter;
use arena_auth::state::AppState;
use arena_auth::store::{MemoryStore, NonceStore, PgStore, UserStore};
use arena_auth::{db, jobs, routes};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "Server terminated with error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        environment = config.environment.as_str(),
        verification_policy = %config.verification_policy,
        "Starting arena auth server"
    );

    let (nonce_store, user_store): (Arc<dyn NonceStore>, Arc<dyn UserStore>) =
        match &config.database_url {
            Some(url) => {
                tracing::info!(
                    database = ?config.database_url_masked(),
                    "Connecting to database..."
                );
                let pool = db::create_pool(url, config.db_max_connections)
                    .await
                    .context("connecting to database")?;
                db::run_migrations(&pool)
                    .await
                    .context("running migrations")?;
                let store = PgStore::new(pool);
                let nonces: Arc<dyn NonceStore> = Arc::new(store.clone());
                let users: Arc<dyn UserStore> = Arc::new(store);
                (nonces, users)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (state lost on restart)");
                let store = MemoryStore::new();
                let nonces: Arc<dyn NonceStore> = Arc::new(store.clone());
                let users: Arc<dyn UserStore> = Arc::new(store);
                (nonces, users)
            }
        };

    let auth_service = Arc::new(AuthService::new(
        nonce_store,
        user_store,
        config.auth_settings(),
        Arc::new(SystemClock),
    ));

    let rate_limiter =
        RateLimiter::new(config.rate_limit_rps).with_proxy_headers(config.trust_proxy_headers);
    if config.trust_proxy_headers {
        tracing::info!("Rate limiting keyed on proxy headers");
    }

    let _housekeeping = jobs::start_housekeeping(
        auth_service.clone(),
        rate_limiter.clone(),
        Duration::from_secs(config.nonce_sweep_interval_seconds),
    )
    .await
    .map_err(|e| anyhow::anyhow!("starting housekeeping job: {:?}", e))?;

    let app_state = AppState::new(auth_service, rate_limiter);
    let app = routes::app(app_state, config.cors_allowed_origins.as_deref());

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    // Serve with graceful shutdown; peer addresses key the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

//! Route definitions and router assembly

mod auth;

pub use auth::auth_routes;

use axum::http::{HeaderValue, Method};
use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the full application router with its middleware stack
pub fn app(state: AppState, cors_allowed_origins: Option<&str>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(auth_routes())
        .layer(axum_middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            middleware::rate_limit,
        ))
        // outside the limiter so 429s carry the headers too
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(axum_middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(cors_allowed_origins))
        .with_state(state)
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins.filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

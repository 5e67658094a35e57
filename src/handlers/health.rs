//! Liveness and readiness endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub verification_policy: String,
    pub version: String,
}

/// GET / - Service banner
pub async fn root() -> &'static str {
    "Kaspa Arena Auth Server"
}

/// GET /health - Report storage connectivity
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, storage) = match state.auth_service.storage_healthy().await {
        Ok(()) => (StatusCode::OK, "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string())
        }
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        storage,
        verification_policy: state.auth_service.verification_policy().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status, Json(body))
}

//! Authentication HTTP handlers
//!
//! Endpoints for wallet-based authentication.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{ChallengeResponse, NonceQuery, UserResponse, VerifyRequest, VerifyResponse};
use crate::state::AppState;

/// GET /auth/nonce - Issue a nonce for wallet authentication
pub async fn request_nonce(
    State(state): State<AppState>,
    Query(query): Query<NonceQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state
        .auth_service
        .issue_challenge(query.address.as_deref())
        .await?;

    Ok(Json(challenge))
}

/// POST /auth/verify - Verify a signed nonce and issue a token
pub async fn verify_signature(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest {
        code: "INVALID_JSON",
        message: e.body_text(),
    })?;
    let login = state.auth_service.verify(&req).await?;

    Ok(Json(VerifyResponse {
        token: login.token,
        address: login.address,
    }))
}

/// GET /auth/me - Get the authenticated player
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    tracing::debug!(address = %user.address, jti = %user.jti, "Fetching current user");

    let record = state
        .auth_service
        .get_user(&user.address)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", user.address)))?;

    Ok(Json(record.into()))
}

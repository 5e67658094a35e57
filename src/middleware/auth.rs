//! Authentication extractor
//!
//! Verifies the bearer token from the `Authorization` header and exposes
//! the wallet address it was issued for.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::ApiError;

/// Authenticated wallet extracted from a bearer token
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.address)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub address: String,
    /// Token ID, for correlating requests made with one token
    pub jti: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::unauthorized(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = auth_service
            .authenticate(bearer.token())
            .map_err(|e| ApiError::from(e).into_response())?;

        Ok(AuthenticatedUser {
            address: claims.sub,
            jti: claims.jti,
        })
    }
}

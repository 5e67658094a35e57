//! Centralized API error handling
//!
//! Maps core errors to HTTP status codes and a flat JSON body:
//! `{ "error": "<message>", "code": "<STABLE_CODE>" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthError, AuthErrorKind, JwtError};

const INVALID_NONCE_MESSAGE: &str = "Invalid or expired nonce";
const SIGNATURE_FAILED_MESSAGE: &str = "Signature verification failed";

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Storage unavailable")]
    Storage(String),

    #[error("Internal server error")]
    InternalError(String),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } | ApiError::Unauthorized { code, .. } => code,
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        // server-side details stay in the log
        let message = self.to_string();

        match &self {
            ApiError::Storage(detail) | ApiError::InternalError(detail) => {
                tracing::error!(error = %detail, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: message,
            code: error_code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err.kind() {
            AuthErrorKind::Validation => ApiError::BadRequest {
                code: auth_error_code(&err),
                message: err.to_string(),
            },
            AuthErrorKind::Authentication => match err {
                AuthError::Token(e) => e.into(),
                _ => ApiError::unauthorized(auth_error_code(&err), public_message(&err)),
            },
            AuthErrorKind::Storage => ApiError::Storage(err.to_string()),
            AuthErrorKind::Internal => ApiError::InternalError(err.to_string()),
        }
    }
}

fn auth_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingField(_) => "MISSING_FIELD",
        AuthError::InvalidAddress(_) => "INVALID_ADDRESS",
        AuthError::InvalidPublicKey(_) => "INVALID_PUBLIC_KEY",
        AuthError::InvalidSignatureFormat(_) => "INVALID_SIGNATURE_FORMAT",
        AuthError::NonceNotFound => "NONCE_NOT_FOUND",
        AuthError::NonceExpired => "NONCE_EXPIRED",
        AuthError::NonceAlreadyUsed => "NONCE_USED",
        AuthError::NonceAddressMismatch => "NONCE_ADDRESS_MISMATCH",
        AuthError::PublicKeyMismatch => "PUBLIC_KEY_MISMATCH",
        AuthError::SignatureMismatch => "SIGNATURE_MISMATCH",
        AuthError::Token(_) => "INVALID_TOKEN",
        AuthError::Storage(_) => "STORAGE_ERROR",
    }
}

/// Every nonce failure shares one public message
fn public_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::PublicKeyMismatch | AuthError::SignatureMismatch => SIGNATURE_FAILED_MESSAGE,
        _ => INVALID_NONCE_MESSAGE,
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => ApiError::unauthorized("TOKEN_EXPIRED", "Token has expired"),
            JwtError::DecodingFailed(_) => ApiError::unauthorized("INVALID_TOKEN", "Invalid token"),
            JwtError::EncodingFailed(e) => ApiError::InternalError(e),
        }
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

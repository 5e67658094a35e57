//! Authentication request/response DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Query string for `GET /auth/nonce`
#[derive(Debug, Default, Deserialize)]
pub struct NonceQuery {
    pub address: Option<String>,
}

/// Response containing a freshly issued challenge
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed challenge submitted by the wallet
///
/// Fields are optional so a missing one is reported by name instead of as
/// a generic JSON rejection.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    pub address: Option<String>,
}

/// Successful verification
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub token: String,
    pub address: String,
}

/// Authenticated player profile
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

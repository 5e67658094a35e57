//! Data models for the arena auth service

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Player record, keyed by wallet address
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            address: user.wallet_address,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Single-use authentication challenge
///
/// `used` only ever moves from `false` to `true`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    #[sqlx(rename = "nonce")]
    pub value: String,
    #[sqlx(rename = "wallet_address")]
    pub address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NonceRecord {
    /// A fresh, unused record
    pub fn new(
        value: String,
        address: Option<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            address,
            expires_at,
            used: false,
            used_at: None,
            created_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the sweep may delete this record
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.used || self.expires_at < now
    }
}

//! Storage capabilities used by the auth core
//!
//! The core only talks to these traits. [`MemoryStore`] backs tests and
//! single-node development; [`PgStore`] backs deployments.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NonceRecord, User};

/// Storage failure, opaque to clients
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.message().to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for authentication challenges
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Persist a new record; never overwrites an existing one
    async fn create_nonce(&self, record: &NonceRecord) -> StoreResult<()>;

    /// Look up a record by its value
    async fn get_nonce(&self, value: &str) -> StoreResult<Option<NonceRecord>>;

    /// Atomically consume a nonce
    ///
    /// Sets `used = true` only if the record exists, is unused and
    /// `now < expires_at`, as a single compare-and-set. Returns whether
    /// this call performed the transition; of any number of concurrent
    /// callers at most one sees `true`.
    async fn mark_used(&self, value: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Delete every record with `expires_at < now` or `used`
    ///
    /// # Returns
    /// Number of records removed
    async fn delete_stale(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Check the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Persistence for player records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the user for `address`, creating it on first login
    ///
    /// Refreshes `last_login_at` on every call.
    async fn upsert_user(&self, address: &str, now: DateTime<Utc>) -> StoreResult<User>;

    async fn find_user(&self, address: &str) -> StoreResult<Option<User>>;
}

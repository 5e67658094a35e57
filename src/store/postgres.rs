//! PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{NonceStore, StoreResult, UserStore};
use crate::models::{NonceRecord, User};

/// Store backed by the `auth_nonces` and `users` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NonceStore for PgStore {
    async fn create_nonce(&self, record: &NonceRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_nonces (nonce, wallet_address, expires_at, used, created_at)
            VALUES ($1, $2, $3, FALSE, $4)
            "#,
        )
        .bind(&record.value)
        .bind(&record.address)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_nonce(&self, value: &str) -> StoreResult<Option<NonceRecord>> {
        let record: Option<NonceRecord> = sqlx::query_as(
            r#"
            SELECT nonce, wallet_address, expires_at, used, used_at, created_at
            FROM auth_nonces
            WHERE nonce = $1
            "#,
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn mark_used(&self, value: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        // single conditional UPDATE, so concurrent callers cannot both win
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_nonces
            SET used = TRUE, used_at = $2
            WHERE nonce = $1 AND used = FALSE AND expires_at > $2
            "#,
        )
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn delete_stale(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM auth_nonces
            WHERE expires_at < $1 OR used = TRUE
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_user(&self, address: &str, now: DateTime<Utc>) -> StoreResult<User> {
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, wallet_address, created_at, last_login_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (wallet_address)
            DO UPDATE SET last_login_at = EXCLUDED.last_login_at
            RETURNING id, wallet_address, created_at, last_login_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user(&self, address: &str) -> StoreResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, wallet_address, created_at, last_login_at
            FROM users
            WHERE wallet_address = $1
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

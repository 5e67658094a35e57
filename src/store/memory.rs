//! In-memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NonceStore, StoreError, StoreResult, UserStore};
use crate::models::{NonceRecord, User};

/// Process-local store; state is lost on restart
#[derive(Clone, Default)]
pub struct MemoryStore {
    nonces: Arc<RwLock<HashMap<String, NonceRecord>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn nonce_count(&self) -> usize {
        self.nonces.read().await.len()
    }
}

#[async_trait]
impl NonceStore for MemoryStore {
    async fn create_nonce(&self, record: &NonceRecord) -> StoreResult<()> {
        let mut nonces = self.nonces.write().await;
        if nonces.contains_key(&record.value) {
            return Err(StoreError::Duplicate(record.value.clone()));
        }
        nonces.insert(record.value.clone(), record.clone());
        Ok(())
    }

    async fn get_nonce(&self, value: &str) -> StoreResult<Option<NonceRecord>> {
        Ok(self.nonces.read().await.get(value).cloned())
    }

    async fn mark_used(&self, value: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        // check and set under one write guard
        let mut nonces = self.nonces.write().await;
        match nonces.get_mut(value) {
            Some(record) if !record.used && !record.is_expired(now) => {
                record.used = true;
                record.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_stale(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut nonces = self.nonces.write().await;
        let before = nonces.len();
        nonces.retain(|_, record| !record.is_stale(now));
        Ok((before - nonces.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, address: &str, now: DateTime<Utc>) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let user = users.entry(address.to_string()).or_insert_with(|| User {
            id: Uuid::new_v4(),
            wallet_address: address.to_string(),
            created_at: now,
            last_login_at: now,
        });
        user.last_login_at = now;
        Ok(user.clone())
    }

    async fn find_user(&self, address: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(address).cloned())
    }
}

//! In-memory store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{RefreshTokenRecord, RefreshTokenStore};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
    inserts: AtomicUsize,
    fail_inserts: bool,
    insert_delay: Option<Duration>,
}

impl MemoryRefreshTokenStore {
    /// Store whose inserts always fail like a broken connection.
    pub fn failing() -> Self {
        Self {
            fail_inserts: true,
            ..Default::default()
        }
    }

    /// Store whose inserts wait `delay` before writing.
    pub fn slow(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Default::default()
        }
    }

    /// Seed a record without counting it as an insert.
    pub async fn seed(&self, record: RefreshTokenRecord) {
        self.records.lock().await.insert(record.token.clone(), record);
    }

    /// Number of successful inserts.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub async fn get(&self, token: &str) -> Option<RefreshTokenRecord> {
        self.records.lock().await.get(token).cloned()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn lookup_valid(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let now = Utc::now();
        Ok(self
            .records
            .lock()
            .await
            .get(token)
            .filter(|record| record.expiry_date > now)
            .cloned())
    }

    async fn insert(&self, record: &RefreshTokenRecord) -> Result<()> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inserts {
            return Err(sqlx::Error::PoolTimedOut.into());
        }

        let mut records = self.records.lock().await;
        if records.contains_key(&record.token) {
            return Err(sqlx::Error::Protocol("duplicate refresh token".into()).into());
        }
        records.insert(record.token.clone(), record.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(token: &str, expiry: Duration) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token: token.into(),
            user_id: "u1".into(),
            expiry_date: Utc::now() + expiry,
        }
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let store = MemoryRefreshTokenStore::default();
        store.insert(&record("t", Duration::days(1))).await.unwrap();

        let first = store.lookup_valid("t").await.unwrap();
        let second = store.lookup_valid("t").await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_equals_absent() {
        let store = MemoryRefreshTokenStore::default();
        store.seed(record("old", -Duration::seconds(1))).await;

        assert_eq!(
            store.lookup_valid("old").await.unwrap(),
            store.lookup_valid("never-inserted").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_duplicate_refused() {
        let store = MemoryRefreshTokenStore::default();
        store.insert(&record("t", Duration::days(1))).await.unwrap();

        assert!(store.insert(&record("t", Duration::days(1))).await.is_err());
        assert_eq!(store.inserts(), 1);
    }
}

//! Refresh token persistence.
#[cfg(test)]
pub(crate) mod memory;
mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;

pub use repository::PgRefreshTokenStore;

/// Database refresh token representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: String,
    pub expiry_date: DateTime<Utc>,
}

/// Storage of refresh tokens keyed by the token string.
///
/// The store holds no lifetime policy: it persists whatever expiry it is
/// given. Rows are never updated nor deleted, expired ones are filtered out.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Get the record for `token` if its expiry date is still in the future.
    ///
    /// Expired and unknown tokens both return `None`.
    async fn lookup_valid(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Insert a new record. Duplicated tokens are refused.
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<()>;
}

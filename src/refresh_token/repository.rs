//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{RefreshTokenRecord, RefreshTokenStore};
use crate::error::Result;

/// PostgreSQL refresh token store.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: Pool<Postgres>,
}

impl PgRefreshTokenStore {
    /// Create a new [`PgRefreshTokenStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn lookup_valid(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token, user_id, expiry_date
            FROM refresh_tokens
            WHERE token = $1
              AND expiry_date > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &RefreshTokenRecord) -> Result<()> {
        // dropping the future before commit rolls the insert back.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, expiry_date)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.token)
        .bind(&record.user_id)
        .bind(record.expiry_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = %record.user_id,
            expiry_date = %record.expiry_date,
            "refresh token stored"
        );
        Ok(())
    }
}

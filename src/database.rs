//! PostgreSQL pool and migrations.
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub const DEFAULT_POOL_SIZE: u32 = 10;

/// PostgreSQL connection pool.
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    pub async fn new(url: &str, pool: u32) -> Result<Self, sqlx::Error> {
        let postgres = PgPoolOptions::new().max_connections(pool).connect(url).await?;

        tracing::info!(pool_size = pool, "postgres connected");

        Ok(Self { postgres })
    }

    /// Execute migrations scripts.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.postgres).await
    }
}

//! PostgreSQL connection pool and migration runner.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::Result;

/// Thin wrapper around a `PgPool`: owns pool sizing policy and migrations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect lazily; the pool is established on first use so a slow or
    /// temporarily-down database doesn't block process startup.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::info!(max_connections, "connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Verify connectivity and run pending migrations. Called once at
    /// startup, after `Config` has been loaded.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        self.run_migrations().await?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => HealthStatus {
                is_healthy: true,
                message: "connected".to_string(),
            },
            Err(e) => HealthStatus {
                is_healthy: false,
                message: format!("connection failed: {e}"),
            },
        }
    }
}

#[derive(Debug)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_lazy_never_fails_before_first_query() {
        let result = Database::connect("postgresql://localhost/does_not_matter", 5).await;
        assert!(result.is_ok());
    }
}

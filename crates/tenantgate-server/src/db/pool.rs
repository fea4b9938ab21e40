//! Postgres pool for the gateway stores.

use super::config::DbConfig;
use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use tenantgate_common_log::spans::store_span;
use tracing::{info, Instrument};

/// Connect and verify the pool with one round trip before serving.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let connect_options = PgConnectOptions::from_str(&config.url)
        .context("Invalid database URL")?
        .application_name(&config.application_name);

    async {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(connect_options)
            .await
            .context("Failed to connect to the gateway database")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Database connection verification failed")?;

        info!(
            max_connections = config.max_connections,
            "Gateway database pool ready"
        );
        Ok::<_, anyhow::Error>(pool)
    }
    .instrument(store_span("postgres", "connect"))
    .await
}

/// Snapshot of pool usage, reported by the readiness check.
pub fn pool_stats(pool: &PgPool) -> PoolStats {
    let size = pool.size();
    let idle = pool.num_idle();
    PoolStats {
        size,
        idle,
        in_use: size.saturating_sub(idle as u32),
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub in_use: u32,
}

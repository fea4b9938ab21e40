//! Database migration utilities.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Apply the bundled gateway migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;

    info!("Migrations completed");
    Ok(())
}

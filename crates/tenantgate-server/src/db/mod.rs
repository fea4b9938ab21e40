//! Postgres connection pool, health checks and migrations.

pub mod config;
pub mod health;
pub mod migration;
pub mod pool;

pub use config::DbConfig;
pub use health::{check_health, DbHealth};
pub use migration::run_migrations;
pub use pool::{create_pool, pool_stats, PoolStats};

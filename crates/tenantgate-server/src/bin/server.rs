//! Tenantgate Server Binary

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tenantgate_server::config::{load_config, validate_config, GatewayConfig, RateLimitBackend};
use tenantgate_server::db::{create_pool, run_migrations};
use tenantgate_server::rate_limit::{InMemoryStore, RateLimitStore};
use tenantgate_server::store::{MemoryStore, PgStore, Seed};
use tenantgate_server::{routes, AppState, GatewayBuilder, Server};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "tenantgate-server", version, about = "Multi-tenant request gateway")]
struct Args {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.config.map(|p| p.display().to_string()))?;
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("configuration error: {}", error);
        }
        anyhow::bail!("invalid configuration ({} problems)", errors.len());
    }

    tenantgate_common_log::init(config.logging.to_log_config())?;

    info!("Starting Tenantgate Server v{}", env!("CARGO_PKG_VERSION"));

    let mut builder = GatewayBuilder::from_config(&config)?
        .rate_limit_store(rate_limit_store(&config)?);

    let db = match &config.database {
        Some(db_config) => {
            let pool = create_pool(db_config).await?;
            if db_config.run_migrations {
                run_migrations(&pool).await?;
            }
            let store = Arc::new(PgStore::new(pool.clone()));
            builder = builder
                .membership_store(store.clone())
                .permission_store(store.clone())
                .webhook_store(store.clone())
                .audit_sink(store);
            Some(pool)
        }
        None => {
            let seed = match &config.memory_store.seed_path {
                Some(path) => Seed::from_file(path)
                    .with_context(|| format!("failed to load seed file {}", path.display()))?,
                None => {
                    warn!("No database configured and no seed file; every tenant request will be refused");
                    Seed::default()
                }
            };
            builder = builder.memory_store(Arc::new(MemoryStore::from_seed(seed)));
            None
        }
    };

    let gateway = routes::api::register(builder)?.build()?;
    info!(routes = gateway.route_count(), "Gateway ready");

    let state = AppState::new(gateway, db, config);
    Server::new(state)?.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn rate_limit_store(config: &GatewayConfig) -> Result<Arc<dyn RateLimitStore>> {
    match config.rate_limit.backend {
        RateLimitBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "redis")]
        RateLimitBackend::Redis => {
            let url = config
                .rate_limit
                .redis_url
                .as_deref()
                .context("rate_limit.redis_url is required for the redis backend")?;
            Ok(Arc::new(tenantgate_server::rate_limit::RedisStore::new(url, "tenantgate:rl")?))
        }
        #[cfg(not(feature = "redis"))]
        RateLimitBackend::Redis => anyhow::bail!("built without the `redis` feature"),
    }
}

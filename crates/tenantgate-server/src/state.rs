//! Shared application state.

use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use sqlx::PgPool;
use std::sync::Arc;

/// State handed to the axum router.
#[derive(Clone)]
pub struct AppState {
    /// The request gateway behind every `/api` route.
    pub gateway: Arc<Gateway>,
    /// Postgres pool, when the gateway runs against a database.
    pub db: Option<PgPool>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(gateway: Gateway, db: Option<PgPool>, config: GatewayConfig) -> Self {
        Self {
            gateway: Arc::new(gateway),
            db,
            config: Arc::new(config),
        }
    }
}

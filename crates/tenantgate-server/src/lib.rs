//! Tenantgate API Server
//!
//! A multi-tenant request gateway. Every `/api` request passes through the
//! same stages before its handler runs:
//!
//! - **Router**: method and path pattern matching with named parameters
//! - **Tenant resolution**: bearer/cookie identity plus active membership
//! - **Rate limiting**: fixed-window counters per identity and path
//! - **Permissions**: role grants per module, cached with a TTL
//! - **Audit**: append-only log of actions and denials
//! - **Webhooks**: fire-and-forget delivery of tenant events
//!
//! # Features
//!
//! - `metrics` - Prometheus metrics endpoint (default)
//! - `redis` - Redis-backed rate limit counters

#![warn(clippy::all)]

pub mod audit;
pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod rate_limit;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;
pub mod webhook;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult};
pub use gateway::{Gateway, GatewayBuilder};
pub use state::AppState;

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Binds the HTTP surface and serves it until shutdown.
pub struct Server {
    addr: SocketAddr,
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Result<Self, anyhow::Error> {
        let addr = state.config.server.socket_addr()?;
        Ok(Self { addr, state })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// Run the server, binding to the configured address.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;

        info!("Server listening on {}", self.addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

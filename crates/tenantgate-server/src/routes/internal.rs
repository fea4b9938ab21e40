//! Internal routes for health checks, metrics, and admin operations.

use crate::db::check_health;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Header carrying the shared admin token.
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Create the internal routes router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .nest("/admin", admin_routes(state))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/permissions/cache", get(permission_cache_stats))
        .route("/permissions/cache/clear", post(clear_permission_cache))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.server.admin_token.as_deref() else {
        return Err(ApiError::NotFound("Admin endpoint".into()));
    };

    let authorized = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| tokens_match(token.as_bytes(), expected.as_bytes()));

    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

// Constant time for equal-length inputs.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "routes": state.gateway.route_count(),
    }))
}

async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let (ready, database) = match &state.db {
        Some(pool) => {
            let health = check_health(pool, READINESS_TIMEOUT).await;
            (health.is_healthy, json!(health))
        }
        None => (true, json!("memory")),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "checks": { "database": database }
        })),
    )
}

async fn prometheus_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

async fn permission_cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.gateway.services().authority.stats();
    Json(json!({
        "hits": stats.hits,
        "misses": stats.misses,
        "entries": stats.entries,
        "hitRate": stats.hit_rate(),
    }))
}

async fn clear_permission_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.gateway.services().authority.clear();
    info!(cleared, "Permission cache cleared by admin request");

    Json(json!({
        "status": "ok",
        "cleared": cleared
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match(b"0123456789abcdef", b"0123456789abcdef"));
        assert!(!tokens_match(b"0123456789abcdeX", b"0123456789abcdef"));
        assert!(!tokens_match(b"0123456789abcde", b"0123456789abcdef"));
        assert!(!tokens_match(b"", b"0123456789abcdef"));
    }
}

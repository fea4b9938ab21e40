//! HTTP surface: internal endpoints plus the gateway fallback.

pub mod api;
mod internal;

use crate::error::ApiError;
use crate::gateway::GatewayService;
use crate::state::AppState;
use axum::{error_handling::HandleErrorLayer, BoxError, Router};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Create the main application router.
///
/// Everything outside `/internal` is handled by the gateway, which also
/// enforces the body limit so oversized requests get the JSON error envelope.
pub fn create_router(state: AppState) -> Router {
    let common_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .layer(TimeoutLayer::new(state.config.server.request_timeout()));

    let gateway = GatewayService::new(state.gateway.clone(), state.config.server.body_limit_bytes);

    Router::new()
        .nest("/internal", internal::router(state.clone()))
        .fallback_service(gateway)
        .layer(common_middleware)
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::RequestTimeout
    } else {
        ApiError::Internal(anyhow::anyhow!("middleware failure: {}", err))
    }
}

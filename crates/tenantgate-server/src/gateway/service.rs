//! Tower service adapter for mounting the gateway in an axum router.

use super::pipeline::{Gateway, GatewayRequest};
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Buffers each request and hands it to [`Gateway::dispatch`].
#[derive(Clone)]
pub struct GatewayService {
    gateway: Arc<Gateway>,
    body_limit: usize,
}

impl GatewayService {
    pub fn new(gateway: Arc<Gateway>, body_limit: usize) -> Self {
        Self { gateway, body_limit }
    }
}

impl Service<Request<Body>> for GatewayService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let gateway = self.gateway.clone();
        let body_limit = self.body_limit;

        Box::pin(async move {
            let response = match GatewayRequest::from_http(req, body_limit).await {
                Ok(request) => gateway.dispatch(request).await,
                Err(err) => err.into_response(),
            };
            Ok(response)
        })
    }
}

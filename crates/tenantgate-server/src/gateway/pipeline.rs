//! Per-request pipeline.

use super::route::{RequestContext, RouteSpec};
use super::GatewayServices;
use crate::auth::{Identity, TenantContext};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::router::{PathParams, RouteTable};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tenantgate_common_log::spans::request_span;
use tracing::{debug, field, Instrument, Span};
use uuid::Uuid;

/// Path parameter naming the target tenant.
pub const TENANT_PARAM: &str = "tenant_id";
/// Header naming the target tenant when the path does not.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Buffered request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Buffer an HTTP request, rejecting bodies over `body_limit` bytes.
    pub async fn from_http(request: Request<Body>, body_limit: usize) -> ApiResult<Self> {
        let (parts, body) = request.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > body_limit) {
            return Err(ApiError::PayloadTooLarge { limit: body_limit });
        }

        // Chunked bodies have no declared length; the limit trips while reading.
        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|_| ApiError::PayloadTooLarge { limit: body_limit })?;

        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers,
            body,
        })
    }
}

/// Runs requests through the gateway stages.
pub struct Gateway {
    routes: RouteTable<RouteSpec>,
    services: Arc<GatewayServices>,
}

impl Gateway {
    pub(super) fn new(routes: RouteTable<RouteSpec>, services: GatewayServices) -> Self {
        Self {
            routes,
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &GatewayServices {
        &self.services
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Handle one request. Every failure becomes an error response.
    pub async fn dispatch(&self, request: GatewayRequest) -> Response {
        let span = request_span(request.method.as_str(), &request.path);

        async move {
            let response = match self.run(request).await {
                Ok(response) => response,
                Err(err) => {
                    metrics::record_outcome(err.error_code());
                    err.into_response()
                }
            };
            debug!(status = response.status().as_u16(), "Request finished");
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: GatewayRequest) -> ApiResult<Response> {
        let GatewayRequest {
            method,
            path,
            query,
            headers,
            body,
        } = request;

        let Some(matched) = self.routes.match_route(&method, &path) else {
            return Err(if self.routes.allows_path(&path) {
                ApiError::MethodNotAllowed
            } else {
                ApiError::NotFound(format!("Route {} {}", method, path))
            });
        };
        let spec = matched.target;
        let params = matched.params;

        let identity = self.services.resolver.resolve_identity(&headers).await?;
        Span::current().record("identity", field::display(identity.id));

        let tenant_id = tenant_id(&params, &headers)?;
        if let Some(tenant_id) = tenant_id {
            Span::current().record("tenant", field::display(tenant_id));
        }

        let tenant = match self.services.resolver.scope(identity.clone(), tenant_id).await {
            Ok(tenant) => tenant,
            Err(err) => {
                self.audit_denial(&identity, tenant_id, &path, &err).await;
                return Err(err);
            }
        };

        let decision = self.services.limiter.check_rate_limit(&identity, &path).await?;
        if !decision.allowed {
            let mut response = ApiError::TooManyRequests {
                retry_after: decision.retry_after_secs(),
            }
            .into_response();
            decision.headers().apply(response.headers_mut());
            metrics::record_outcome("too_many_requests");
            return Ok(response);
        }

        let mut response = match self.authorized(spec, tenant, params, query, body, &method, &path).await {
            Ok(response) => {
                metrics::record_outcome("ok");
                response
            }
            Err(err) => {
                metrics::record_outcome(err.error_code());
                err.into_response()
            }
        };
        decision.headers().apply(response.headers_mut());
        Ok(response)
    }

    /// Stages after the rate limiter.
    #[allow(clippy::too_many_arguments)]
    async fn authorized(
        &self,
        spec: &RouteSpec,
        tenant: TenantContext,
        params: PathParams,
        query: HashMap<String, String>,
        body: Bytes,
        method: &Method,
        path: &str,
    ) -> ApiResult<Response> {
        if let Some(required) = &spec.permission {
            if let Err(err) = self
                .services
                .authority
                .require_permission(&tenant, &required.module, required.action)
                .await
            {
                self.audit_denial(&tenant.identity, tenant.tenant_id, path, &err).await;
                return Err(err);
            }
        }

        let fallback_id = params.get("id").cloned();
        let ctx = RequestContext {
            tenant: tenant.clone(),
            params,
            query,
            body,
            services: self.services.clone(),
        };

        let output = spec.handler.handle(ctx).await?;
        if !output.status.is_success() {
            debug!(status = output.status.as_u16(), "Handler declined; skipping audit and webhooks");
            return Ok(output.into_response());
        }

        if let Some(audit) = &spec.audit {
            let resource_id = output.resource_id.clone().or(fallback_id);
            self.services
                .audit
                .record(
                    &tenant,
                    audit.action,
                    &audit.resource,
                    resource_id,
                    Some(json!({ "method": method.as_str(), "path": path })),
                )
                .await;
        }

        if let Some(event) = &spec.webhook_event {
            self.services
                .webhooks
                .trigger(&tenant, event, output.body.clone())
                .await;
        }

        Ok(output.into_response())
    }

    /// Record `access_denied` for a 403 once the identity is known.
    async fn audit_denial(&self, identity: &Identity, tenant_id: Option<Uuid>, path: &str, err: &ApiError) {
        if err.is_forbidden() {
            self.services
                .audit
                .record_denied(identity, tenant_id, path, &err.to_string())
                .await;
        }
    }
}

/// Tenant targeted by the request: the `tenant_id` path parameter, else the
/// `X-Tenant-Id` header.
fn tenant_id(params: &PathParams, headers: &HeaderMap) -> ApiResult<Option<Uuid>> {
    let raw = match params.get(TENANT_PARAM) {
        Some(value) => Some(value.as_str()),
        None => headers
            .get(TENANT_HEADER)
            .map(|v| v.to_str().map_err(|_| ApiError::validation("X-Tenant-Id header is not valid text")))
            .transpose()?,
    };

    raw.map(|value| {
        Uuid::parse_str(value.trim()).map_err(|_| {
            let mut fields = HashMap::new();
            fields.insert(TENANT_PARAM.to_string(), vec!["must be a UUID".to_string()]);
            ApiError::ValidationFailed {
                message: format!("invalid tenant id '{}'", value),
                fields,
            }
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_from_path_wins_over_header() {
        let path_tenant = Uuid::new_v4();
        let mut params = PathParams::new();
        params.insert(TENANT_PARAM.into(), path_tenant.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

        assert_eq!(tenant_id(&params, &headers).unwrap(), Some(path_tenant));
    }

    #[test]
    fn test_tenant_from_header() {
        let tenant = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&tenant.to_string()).unwrap());

        assert_eq!(tenant_id(&PathParams::new(), &headers).unwrap(), Some(tenant));
        assert_eq!(tenant_id(&PathParams::new(), &HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_malformed_tenant_is_validation_error() {
        let mut params = PathParams::new();
        params.insert(TENANT_PARAM.into(), "acme".into());

        let err = tenant_id(&params, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn test_from_http_parses_query_and_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/reports?page=2&limit=5&name=a%20b")
            .body(Body::from(r#"{"x":1}"#))
            .unwrap();

        let gateway_request = GatewayRequest::from_http(request, 1024).await.unwrap();
        assert_eq!(gateway_request.path, "/api/reports");
        assert_eq!(gateway_request.query["page"], "2");
        assert_eq!(gateway_request.query["name"], "a b");
        assert_eq!(&gateway_request.body[..], br#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_from_http_rejects_oversized_body() {
        let request = Request::builder()
            .uri("/api/x")
            .body(Body::from(vec![b'a'; 64]))
            .unwrap();

        let err = GatewayRequest::from_http(request, 16).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_from_http_rejects_declared_length_over_limit() {
        let request = Request::builder()
            .uri("/api/x")
            .header(header::CONTENT_LENGTH, "4096")
            .body(Body::empty())
            .unwrap();

        let err = GatewayRequest::from_http(request, 1024).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}

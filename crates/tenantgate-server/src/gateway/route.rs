//! Route declarations and handler contract.

use crate::audit::AuditAction;
use crate::auth::{Identity, TenantContext};
use crate::authz::Action;
use crate::error::{ApiError, ApiResult};
use crate::router::PathParams;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::GatewayServices;

/// Everything a handler sees of an authorized request.
pub struct RequestContext {
    pub tenant: TenantContext,
    pub params: PathParams,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub services: Arc<GatewayServices>,
}

impl RequestContext {
    pub fn identity(&self) -> &Identity {
        &self.tenant.identity
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::validation(format!("invalid JSON body: {}", e)))
    }
}

/// Handler result: status, JSON body and the id of the touched resource.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub status: StatusCode,
    pub body: Value,
    pub resource_id: Option<String>,
}

impl HandlerOutput {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            resource_id: None,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
            resource_id: None,
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }
}

impl IntoResponse for HandlerOutput {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Business logic behind a gateway route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, ctx: RequestContext) -> ApiResult<HandlerOutput>;
}

#[async_trait]
impl<F, Fut> RouteHandler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = ApiResult<HandlerOutput>> + Send,
{
    async fn handle(&self, ctx: RequestContext) -> ApiResult<HandlerOutput> {
        (self)(ctx).await
    }
}

/// Permission a route requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement {
    pub module: String,
    pub action: Action,
}

/// Audit entry a route writes on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSpec {
    pub action: AuditAction,
    pub resource: String,
}

/// A handler plus the gateway stages that wrap it.
#[derive(Clone)]
pub struct RouteSpec {
    pub handler: Arc<dyn RouteHandler>,
    pub permission: Option<PermissionRequirement>,
    pub audit: Option<AuditSpec>,
    pub webhook_event: Option<String>,
}

impl RouteSpec {
    pub fn new<H: RouteHandler + 'static>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            permission: None,
            audit: None,
            webhook_event: None,
        }
    }

    /// Require `action` on `module`.
    pub fn require(mut self, module: impl Into<String>, action: Action) -> Self {
        self.permission = Some(PermissionRequirement {
            module: module.into(),
            action,
        });
        self
    }

    /// Record `action` on `resource` after the handler succeeds.
    pub fn audit(mut self, action: AuditAction, resource: impl Into<String>) -> Self {
        self.audit = Some(AuditSpec {
            action,
            resource: resource.into(),
        });
        self
    }

    /// Trigger `event` with the handler's body after it succeeds.
    pub fn emit(mut self, event: impl Into<String>) -> Self {
        self.webhook_event = Some(event.into());
        self
    }
}

//! Identity and tenant resolution.

use super::{
    provider::IdentityProvider,
    types::{Identity, TenantContext},
};
use crate::error::{ApiError, ApiResult, ErrorContext};
use crate::store::MembershipStore;
use axum::http::{header, HeaderMap};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const TOKEN_COOKIE: &str = "access_token";

/// Resolves the caller and, when a tenant is targeted, their role in it.
pub struct TenantResolver {
    provider: Arc<dyn IdentityProvider>,
    memberships: Arc<dyn MembershipStore>,
}

impl TenantResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>, memberships: Arc<dyn MembershipStore>) -> Self {
        Self {
            provider,
            memberships,
        }
    }

    /// Authenticate the request from its bearer credential.
    pub async fn resolve_identity(&self, headers: &HeaderMap) -> ApiResult<Identity> {
        let token = extract_token(headers)?;
        self.provider.validate(&token).await
    }

    /// Authenticate, then scope the identity to `tenant_id` if one is given.
    pub async fn resolve_tenant_context(
        &self,
        headers: &HeaderMap,
        tenant_id: Option<Uuid>,
    ) -> ApiResult<TenantContext> {
        let identity = self.resolve_identity(headers).await?;
        self.scope(identity, tenant_id).await
    }

    /// Scope an authenticated identity to a tenant.
    ///
    /// Without a tenant the context carries no role. With one, the identity
    /// needs an active membership that assigns a role.
    pub async fn scope(&self, identity: Identity, tenant_id: Option<Uuid>) -> ApiResult<TenantContext> {
        let Some(tenant_id) = tenant_id else {
            return Ok(TenantContext::unscoped(identity));
        };

        let membership = self
            .memberships
            .membership(tenant_id, identity.id)
            .await
            .context("membership lookup")?
            .filter(|m| m.active)
            .forbidden("No active membership for this tenant")?;

        let Some(role) = membership.role else {
            warn!(identity = %identity.id, tenant = %tenant_id, "membership has no role");
            return Err(ApiError::forbidden("No role assigned in this tenant"));
        };

        debug!(identity = %identity.id, tenant = %tenant_id, role = %role, "tenant resolved");
        Ok(TenantContext::scoped(identity, tenant_id, role))
    }
}

/// Bearer token from the `Authorization` header, falling back to the
/// `access_token` cookie.
pub fn extract_token(headers: &HeaderMap) -> ApiResult<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| ApiError::InvalidToken)?;

        // Scheme names are case-insensitive
        let bearer = auth_str
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"));
        if let Some((_, token)) = bearer {
            let token = token.trim();
            if token.is_empty() {
                return Err(ApiError::Unauthorized);
            }
            return Ok(token.to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        let cookie_str = cookie_header.to_str().map_err(|_| ApiError::InvalidToken)?;

        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == TOKEN_COOKIE && !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
    }

    Err(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use crate::auth::{JwtIdentityProvider, Membership};
    use crate::store::MemoryStore;
    use axum::http::HeaderValue;
    use tenantgate_test_utils::{bearer, test_token, TEST_JWT_SECRET};

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn resolver(store: Arc<MemoryStore>) -> TenantResolver {
        TenantResolver::new(Arc::new(JwtIdentityProvider::new(TEST_JWT_SECRET, 0)), store)
    }

    #[test_case("Bearer test_token"; "canonical")]
    #[test_case("bearer test_token"; "lowercase")]
    #[test_case("BEARER  test_token"; "uppercase extra space")]
    fn test_extract_token_from_bearer_header(value: &str) {
        let headers = headers_with(header::AUTHORIZATION, value);
        assert_eq!(extract_token(&headers).unwrap(), "test_token");
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let headers = headers_with(header::COOKIE, "theme=dark; access_token=test_token");
        assert_eq!(extract_token(&headers).unwrap(), "test_token");
    }

    #[test]
    fn test_extract_token_missing() {
        assert!(matches!(extract_token(&HeaderMap::new()), Err(ApiError::Unauthorized)));

        let headers = headers_with(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert!(matches!(extract_token(&headers), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_no_tenant_yields_unscoped_context() {
        let id = Uuid::new_v4();
        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));

        let ctx = resolver(Arc::new(MemoryStore::new()))
            .resolve_tenant_context(&headers, None)
            .await
            .unwrap();

        assert_eq!(ctx.identity.id, id);
        assert!(ctx.tenant_id.is_none());
        assert!(ctx.role.is_none());
    }

    #[tokio::test]
    async fn test_active_membership_scopes_role() {
        let id = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.add_membership(Membership {
            tenant_id: tenant,
            identity_id: id,
            role: Some("cashier".into()),
            active: true,
        });

        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));
        let ctx = resolver(store)
            .resolve_tenant_context(&headers, Some(tenant))
            .await
            .unwrap();

        assert_eq!(ctx.scope(), Some((tenant, "cashier")));
    }

    #[tokio::test]
    async fn test_inactive_membership_is_forbidden() {
        let id = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.add_membership(Membership {
            tenant_id: tenant,
            identity_id: id,
            role: Some("manager".into()),
            active: false,
        });

        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));
        let err = resolver(store)
            .resolve_tenant_context(&headers, Some(tenant))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_membership_without_role_is_forbidden() {
        let id = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.add_membership(Membership {
            tenant_id: tenant,
            identity_id: id,
            role: None,
            active: true,
        });

        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));
        let err = resolver(store)
            .resolve_tenant_context(&headers, Some(tenant))
            .await
            .unwrap_err();

        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_forbidden() {
        let id = Uuid::new_v4();
        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));

        let err = resolver(Arc::new(MemoryStore::new()))
            .resolve_tenant_context(&headers, Some(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);

        let headers = headers_with(header::AUTHORIZATION, &bearer(&test_token(id)));
        let err = resolver(store)
            .resolve_tenant_context(&headers, Some(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_missing_credential_is_unauthorized() {
        let err = resolver(Arc::new(MemoryStore::new()))
            .resolve_identity(&HeaderMap::new())
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
    }
}

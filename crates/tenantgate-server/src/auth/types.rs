//! Identity and tenant context types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity ID).
    pub sub: String,
    /// Identity email, when the provider shares it.
    #[serde(default)]
    pub email: Option<String>,
    /// Issued at timestamp.
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Get identity ID as UUID.
    pub fn identity_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Authenticated caller. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: Uuid, email: Option<String>) -> Self {
        Self { id, email }
    }

    /// Create from validated claims.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let id = claims.identity_id()?;
        Some(Self {
            id,
            email: claims.email,
        })
    }
}

/// Row of the tenant membership relation (identity × tenant → role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub tenant_id: Uuid,
    pub identity_id: Uuid,
    pub role: Option<String>,
    pub active: bool,
}

/// Caller identity, optionally scoped to a tenant and role.
///
/// Only the resolver produces a scoped context, and only for an active
/// membership with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub identity: Identity,
    pub tenant_id: Option<Uuid>,
    pub role: Option<String>,
}

impl TenantContext {
    /// Context for requests that target no tenant.
    pub fn unscoped(identity: Identity) -> Self {
        Self {
            identity,
            tenant_id: None,
            role: None,
        }
    }

    pub(crate) fn scoped(identity: Identity, tenant_id: Uuid, role: String) -> Self {
        Self {
            identity,
            tenant_id: Some(tenant_id),
            role: Some(role),
        }
    }

    /// Tenant and role, present together or not at all.
    pub fn scope(&self) -> Option<(Uuid, &str)> {
        match (self.tenant_id, self.role.as_deref()) {
            (Some(tenant_id), Some(role)) => Some((tenant_id, role)),
            _ => None,
        }
    }
}

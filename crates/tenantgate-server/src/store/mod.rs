//! Collaborator stores the gateway reads from and writes to.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, Seed};
pub use postgres::PgStore;

use crate::audit::AuditEntry;
use crate::auth::Membership;
use crate::authz::PermissionRecord;
use crate::webhook::WebhookRegistration;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tenant membership lookup.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn membership(&self, tenant_id: Uuid, identity_id: Uuid) -> StoreResult<Option<Membership>>;
}

/// Permission records per tenant role.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions(&self, tenant_id: Uuid, role: &str) -> StoreResult<Vec<PermissionRecord>>;
}

/// Webhook registrations per tenant.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Active registrations of `tenant_id` subscribed to `event`.
    async fn active_registrations(&self, tenant_id: Uuid, event: &str) -> StoreResult<Vec<WebhookRegistration>>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()>;
}

//! Module-level permissions per tenant role.

pub mod authority;
pub mod types;

pub use authority::{PermissionAuthority, DEFAULT_PERMISSION_TTL};
pub use types::{Action, CacheStats, PermissionRecord, ADMIN_ROLE};

//! Caller authentication and tenant resolution.

pub mod jwt;
pub mod provider;
pub mod resolver;
pub mod types;

pub use provider::{IdentityProvider, JwtIdentityProvider};
pub use resolver::{extract_token, TenantResolver};
pub use types::{Claims, Identity, Membership, TenantContext};

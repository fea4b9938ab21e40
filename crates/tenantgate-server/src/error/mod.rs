//! Error handling for the gateway.

pub mod context;
pub mod response;
pub mod types;

pub use context::ErrorContext;
pub use response::ErrorResponse;
pub use types::{ApiError, ApiResult};

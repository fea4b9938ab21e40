//! Conversions from collaborator results into gateway errors.

use super::types::ApiError;

/// Extension trait used at the seams where a store answer becomes an
/// [`ApiError`].
pub trait ErrorContext<T> {
    /// A failed lookup: internal error carrying `context`.
    fn context(self, context: impl Into<String>) -> Result<T, ApiError>;

    /// A missing or failed answer refuses the caller with `message`.
    fn forbidden(self, message: impl Into<String>) -> Result<T, ApiError>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ErrorContext<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::Internal(anyhow::Error::from(e).context(context.into())))
    }

    fn forbidden(self, message: impl Into<String>) -> Result<T, ApiError> {
        self.map_err(|_| ApiError::Forbidden(message.into()))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, context: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::Internal(anyhow::anyhow!(context.into())))
    }

    fn forbidden(self, message: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::Forbidden(message.into()))
    }
}

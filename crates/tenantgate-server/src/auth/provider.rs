//! Identity providers.

use super::{jwt::TokenDecoder, types::Identity};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use tracing::debug;

/// Validates a bearer credential and returns the caller identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fails with a 401-class error for any invalid credential.
    async fn validate(&self, token: &str) -> ApiResult<Identity>;
}

/// Identity provider backed by HS256-signed JWTs.
pub struct JwtIdentityProvider {
    decoder: TokenDecoder,
}

impl JwtIdentityProvider {
    pub fn new(secret: impl Into<String>, leeway_secs: u64) -> Self {
        Self {
            decoder: TokenDecoder::new(secret, leeway_secs),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn validate(&self, token: &str) -> ApiResult<Identity> {
        let claims = self.decoder.decode(token).map_err(|err| {
            debug!(error = %err, "token rejected");
            ApiError::from(err)
        })?;

        Identity::from_claims(claims).ok_or(ApiError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgate_test_utils::{expired_token, mint_token, TEST_JWT_SECRET};
    use uuid::Uuid;

    fn provider() -> JwtIdentityProvider {
        JwtIdentityProvider::new(TEST_JWT_SECRET, 0)
    }

    #[tokio::test]
    async fn test_valid_token() {
        let id = Uuid::new_v4();
        let token = mint_token(TEST_JWT_SECRET, id, None, 300);

        let identity = provider().validate(&token).await.unwrap();
        assert_eq!(identity.id, id);
        assert!(identity.email.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_maps_to_token_expired() {
        let token = expired_token(TEST_JWT_SECRET, Uuid::new_v4());
        let err = provider().validate(&token).await.unwrap_err();
        assert!(matches!(err, ApiError::TokenExpired));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let err = provider().validate("not.a.jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
        assert!(err.is_unauthorized());
    }
}

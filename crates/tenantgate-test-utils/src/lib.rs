//! Test utilities for tenantgate crates.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

/// Signing secret used by test gateways.
pub const TEST_JWT_SECRET: &str = "tenantgate-test-secret-0123456789abcdef";

/// Mint an HS256 access token the way the identity provider would.
pub fn mint_token(secret: &str, user_id: Uuid, email: Option<&str>, expires_in: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": user_id.to_string(),
        "email": email,
        "iat": now,
        "exp": now + expires_in,
    });

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode test token")
}

/// Mint a token that expired well past any validation leeway.
pub fn expired_token(secret: &str, user_id: Uuid) -> String {
    mint_token(secret, user_id, None, -3600)
}

/// Token signed with [`TEST_JWT_SECRET`], valid for one hour.
pub fn test_token(user_id: Uuid) -> String {
    mint_token(TEST_JWT_SECRET, user_id, Some("user@example.com"), 3600)
}

/// Format an `Authorization` header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

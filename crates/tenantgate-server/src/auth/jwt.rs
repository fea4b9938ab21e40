//! JWT decoding.

use super::types::Claims;
use jsonwebtoken::{decode, DecodingKey, Validation};

/// Decode and validate a JWT token.
pub fn decode_token(token: &str, secret: &str, leeway_secs: u64) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = leeway_secs;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Token decoder bound to one signing secret.
pub struct TokenDecoder {
    secret: String,
    leeway_secs: u64,
}

impl TokenDecoder {
    pub fn new(secret: impl Into<String>, leeway_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            leeway_secs,
        }
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode_token(token, &self.secret, self.leeway_secs)
    }
}

pub mod permissions;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;
use permissions::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: Role, name: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role,
            name,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Sign a token for an authenticated user.
///
/// An empty secret is a deployment fault, not a client fault, and is reported
/// as ServerMisconfigured.
pub fn issue_token(claims: &Claims) -> Result<String, ApiError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(ApiError::server_misconfigured("JWT_SECRET is not set"));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| ApiError::internal(format!("token generation failed: {}", e)))
}

/// Verify a bearer token and return its claims.
pub fn verify_token(token: &str) -> Result<Claims, ApiError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(ApiError::server_misconfigured("JWT_SECRET is not set"));
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        std::env::set_var("JWT_SECRET", "test-secret-for-unit-tests");
        // CONFIG is a Lazy singleton; the override only matters if this test
        // initializes it first, which is fine for an isolated `cargo test` run.
        let claims = Claims::new(
            Uuid::new_v4(),
            "staff@example.com".to_string(),
            Role::Staff,
            "Staff Member".to_string(),
        );
        if config::config().security.jwt_secret.is_empty() {
            return; // config was initialized before the override; nothing to verify
        }
        let token = issue_token(&claims).unwrap();
        let decoded = verify_token(&token).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, Role::Staff);
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        std::env::set_var("JWT_SECRET", "test-secret-for-unit-tests");
        if config::config().security.jwt_secret.is_empty() {
            return;
        }
        let err = verify_token("not-a-jwt").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}

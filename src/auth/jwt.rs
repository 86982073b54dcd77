use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::Role;

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            sub: user_id,
            role,
            exp: (Utc::now() + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_survive_encoding() {
        let token = encode_token(&Claims::new(42, Role::Hospital), "secret").unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Hospital);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = encode_token(&Claims::new(1, Role::Admin), "secret").unwrap();
        assert!(decode_token(&token, "other").is_err());
    }
}

//! Access tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::StackError;
use crate::models::user::{User, UserId, UserRole};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Sign a token for `user`
    pub fn issue(&self, user: &User) -> Result<String, StackError> {
        let now = Utc::now();
        let claims = TokenClaims {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| StackError::Internal(format!("Unable to sign token: {}", e)))
    }

    /// Verify the signature and expiry of `raw` and return its claims
    pub fn parse(&self, raw: &str) -> Result<TokenClaims, StackError> {
        decode::<TokenClaims>(raw, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| StackError::Unauthorized(format!("Invalid JWT token: {}", e)))
    }
}

//! Password hashing and JWT issuing for user accounts.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::{Result, StoreError};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::Internal(format!("password hashing failed: {e}")))
}

/// False for a wrong password and for an unparsable stored hash alike.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind { Access, Refresh }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// HS256 signing material plus token lifetimes.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret), access_ttl, refresh_ttl }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.access_ttl, config.refresh_ttl)
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind { TokenKind::Access => self.access_ttl, TokenKind::Refresh => self.refresh_ttl };
        let claims = Claims { user_id, token_type: kind, iat: now.timestamp(), exp: (now + ttl).timestamp(), jti: Uuid::new_v4().simple().to_string() };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| StoreError::Internal(format!("token encoding failed: {e}")))
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let invalid = || StoreError::AuthenticationFailed("Given token not valid for any token type".to_string());
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256)).map_err(|e| {
            tracing::debug!(error = %e, "Rejected token");
            invalid()
        })?;
        if data.claims.token_type != expected { return Err(invalid()); }
        Ok(data.claims)
    }
}

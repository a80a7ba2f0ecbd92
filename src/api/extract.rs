//! Request extractors: caller identity, JSON bodies, query strings and path ids.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::{Deserialize, Deserializer};

use super::AppState;
use crate::auth::TokenKind;
use crate::domain::aggregates::User;
use crate::{Result, StoreError};

/// JSON body whose rejections render as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(StoreError))]
pub struct Payload<T>(pub T);

/// Query string whose rejections render as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(StoreError))]
pub struct Params<T>(pub T);

/// Path parameters; a malformed id is reported as not found.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(StoreError))]
pub struct Ids<T>(pub T);

/// Deserializes a present field, including an explicit `null`, as `Some`.
/// Pair with `#[serde(default)]` so an absent field stays `None`.
pub(crate) fn nullable<'de, D, T>(d: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

/// The caller, resolved from an `Authorization: JWT <token>` (or `Bearer`) header.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn user(&self) -> Result<&User> {
        match self {
            Self::User(user) => Ok(user),
            Self::Anonymous => Err(StoreError::NotAuthenticated),
        }
    }

    pub fn staff(&self) -> Result<&User> {
        let user = self.user()?;
        if user.is_staff { Ok(user) } else { Err(StoreError::PermissionDenied) }
    }

    pub fn is_staff(&self) -> bool { matches!(self, Self::User(u) if u.is_staff) }
}

fn bearer(parts: &Parts) -> Result<Option<&str>> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else { return Ok(None) };
    let header = header.to_str().map_err(|_| StoreError::AuthenticationFailed("Invalid Authorization header.".to_string()))?;
    let token = header.strip_prefix("JWT ").or_else(|| header.strip_prefix("Bearer ")).map(str::trim);
    match token {
        Some("") => Err(StoreError::AuthenticationFailed("Authorization header must contain two space-delimited values".to_string())),
        other => Ok(other),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = bearer(parts)? else { return Ok(Self::Anonymous) };
        let claims = state.jwt.verify(token, TokenKind::Access)?;
        let user = state
            .store
            .get_user(claims.user_id)
            .await?
            .ok_or_else(|| StoreError::AuthenticationFailed("User not found".to_string()))?;
        Ok(Self::User(user))
    }
}

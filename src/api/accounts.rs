//! User registration and JWT issuing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use super::extract::{Identity, Payload};
use super::AppState;
use crate::auth::{hash_password, verify_password, TokenKind};
use crate::domain::aggregates::{CustomerDraft, NewUser, User};
use crate::store::Store;
use crate::{Result, StoreError};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    pub username: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Serialize)]
pub struct AccessToken {
    pub access: String,
}

/// Creates a user together with the customer profile every account carries.
pub(crate) async fn create_account(store: &dyn Store, user: NewUser) -> Result<User> {
    let user = store.create_user(&user).await?;
    store.create_customer(user.id, &CustomerDraft::default()).await?;
    tracing::info!(user_id = user.id, username = %user.username, staff = user.is_staff, "Account created");
    Ok(user)
}

/// Makes sure a staff account named `username` exists; an existing account is returned untouched.
pub async fn ensure_superuser(store: &dyn Store, username: &str, password: &str) -> Result<User> {
    if let Some(user) = store.find_user(username).await? {
        return Ok(user);
    }
    let user = NewUser {
        username: username.to_string(),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: hash_password(password)?,
        is_staff: true,
    };
    create_account(store, user).await
}

#[instrument(skip(s, body))]
pub async fn register(State(s): State<AppState>, Payload(body): Payload<RegisterBody>) -> Result<(StatusCode, Json<User>)> {
    body.validate()?;
    let user = NewUser {
        password_hash: hash_password(&body.password)?,
        username: body.username,
        email: body.email.unwrap_or_default(),
        first_name: body.first_name,
        last_name: body.last_name,
        is_staff: false,
    };
    Ok((StatusCode::CREATED, Json(create_account(s.store.as_ref(), user).await?)))
}

pub async fn me(identity: Identity) -> Result<Json<User>> {
    Ok(Json(identity.user()?.clone()))
}

#[instrument(skip(s, body))]
pub async fn create_token(State(s): State<AppState>, Payload(body): Payload<Credentials>) -> Result<Json<TokenPair>> {
    let user = s.store.find_user(&body.username).await?;
    let Some(user) = user.filter(|u| verify_password(&u.password_hash, &body.password)) else {
        tracing::info!(username = %body.username, "Login rejected");
        return Err(StoreError::AuthenticationFailed(BAD_CREDENTIALS.to_string()));
    };
    Ok(Json(TokenPair { refresh: s.jwt.issue(user.id, TokenKind::Refresh)?, access: s.jwt.issue(user.id, TokenKind::Access)? }))
}

pub async fn refresh_token(State(s): State<AppState>, Payload(body): Payload<RefreshBody>) -> Result<Json<AccessToken>> {
    let claims = s.jwt.verify(&body.refresh, TokenKind::Refresh)?;
    if s.store.get_user(claims.user_id).await?.is_none() {
        return Err(StoreError::AuthenticationFailed(BAD_CREDENTIALS.to_string()));
    }
    Ok(Json(AccessToken { access: s.jwt.issue(claims.user_id, TokenKind::Access)? }))
}

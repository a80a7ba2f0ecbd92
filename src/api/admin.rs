//! Staff back office: adding users, tag autocomplete and tagging products.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use super::accounts::create_account;
use super::extract::{Identity, Ids, Params, Payload};
use super::AppState;
use crate::auth::hash_password;
use crate::domain::aggregates::{NewUser, Tag, TaggedItem, User, PRODUCT_CONTENT_TYPE};
use crate::{Result, StoreError};

#[derive(Debug, Deserialize, Validate)]
pub struct AddUserForm {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    pub username: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password1: String,
    pub password2: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagSearch {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagBody {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub label: String,
}

#[instrument(skip(s, identity, form))]
pub async fn add_user(State(s): State<AppState>, identity: Identity, Payload(form): Payload<AddUserForm>) -> Result<(StatusCode, Json<User>)> {
    identity.staff()?;
    form.validate()?;
    if form.password1 != form.password2 {
        return Err(StoreError::field("password2", "The two password fields didn't match."));
    }
    let user = NewUser {
        password_hash: hash_password(&form.password1)?,
        username: form.username,
        email: form.email.unwrap_or_default(),
        first_name: form.first_name,
        last_name: form.last_name,
        is_staff: false,
    };
    Ok((StatusCode::CREATED, Json(create_account(s.store.as_ref(), user).await?)))
}

pub async fn search_tags(State(s): State<AppState>, identity: Identity, Params(q): Params<TagSearch>) -> Result<Json<Vec<Tag>>> {
    identity.staff()?;
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(s.store.search_tags(search).await?))
}

async fn require_product(s: &AppState, id: i64) -> Result<()> {
    s.store.get_product(id).await?.map(|_| ()).ok_or(StoreError::NotFound)
}

pub async fn product_tags(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<Json<Vec<TaggedItem>>> {
    identity.staff()?;
    require_product(&s, id).await?;
    Ok(Json(s.store.tags_for(PRODUCT_CONTENT_TYPE, id).await?))
}

/// Tags a product, creating the tag on first use. Tagging twice returns the existing link.
#[instrument(skip(s, identity))]
pub async fn tag_product(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(body): Payload<TagBody>,
) -> Result<(StatusCode, Json<TaggedItem>)> {
    identity.staff()?;
    body.validate()?;
    require_product(&s, id).await?;
    let item = s.store.tag_object(body.label.trim(), PRODUCT_CONTENT_TYPE, id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(s, identity))]
pub async fn untag_product(State(s): State<AppState>, identity: Identity, Ids((id, tagged_item_id)): Ids<(i64, i64)>) -> Result<StatusCode> {
    identity.staff()?;
    if !s.store.untag(PRODUCT_CONTENT_TYPE, id, tagged_item_id).await? { return Err(StoreError::NotFound); }
    Ok(StatusCode::NO_CONTENT)
}

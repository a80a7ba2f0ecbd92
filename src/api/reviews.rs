//! Reviews nested under a product; every operation is scoped to the product in the path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use super::extract::{Ids, Payload};
use super::AppState;
use crate::domain::aggregates::{Review, ReviewDraft};
use crate::{Result, StoreError};

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewBody {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub name: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: String,
}

impl ReviewBody {
    fn into_draft(self) -> Result<ReviewDraft> {
        self.validate()?;
        Ok(ReviewDraft { name: self.name, description: self.description })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list_reviews(State(s): State<AppState>, Ids(product_id): Ids<i64>) -> Result<Json<Vec<Review>>> {
    Ok(Json(s.store.list_reviews(product_id).await?))
}

pub async fn get_review(State(s): State<AppState>, Ids((product_id, id)): Ids<(i64, i64)>) -> Result<Json<Review>> {
    Ok(Json(s.store.get_review(product_id, id).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, body))]
pub async fn create_review(
    State(s): State<AppState>,
    Ids(product_id): Ids<i64>,
    Payload(body): Payload<ReviewBody>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = s.store.create_review(product_id, &body.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(s, body))]
pub async fn update_review(
    State(s): State<AppState>,
    Ids((product_id, id)): Ids<(i64, i64)>,
    Payload(body): Payload<ReviewBody>,
) -> Result<Json<Review>> {
    let draft = body.into_draft()?;
    Ok(Json(s.store.update_review(product_id, id, &draft).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, patch))]
pub async fn patch_review(
    State(s): State<AppState>,
    Ids((product_id, id)): Ids<(i64, i64)>,
    Payload(patch): Payload<ReviewPatch>,
) -> Result<Json<Review>> {
    let current = s.store.get_review(product_id, id).await?.ok_or(StoreError::NotFound)?;
    let draft = ReviewBody { name: patch.name.unwrap_or(current.name), description: patch.description.unwrap_or(current.description) }.into_draft()?;
    Ok(Json(s.store.update_review(product_id, id, &draft).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s))]
pub async fn delete_review(State(s): State<AppState>, Ids((product_id, id)): Ids<(i64, i64)>) -> Result<StatusCode> {
    if !s.store.delete_review(product_id, id).await? { return Err(StoreError::NotFound); }
    Ok(StatusCode::NO_CONTENT)
}

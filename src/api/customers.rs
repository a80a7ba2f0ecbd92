//! Customer profiles: staff manage any record, a signed-in user manages their own via `me`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use super::extract::{nullable, Identity, Ids, Payload};
use super::AppState;
use crate::domain::aggregates::{Customer, CustomerDraft};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Membership;
use crate::{Result, StoreError};

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerBody {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub phone: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub membership: Membership,
}

impl CustomerBody {
    fn into_draft(self) -> Result<CustomerDraft> {
        self.validate()?;
        Ok(CustomerDraft { phone: self.phone, birth_date: self.birth_date, membership: self.membership })
    }
}

impl From<Customer> for CustomerBody {
    fn from(c: Customer) -> Self {
        Self { phone: c.phone, birth_date: c.birth_date, membership: c.membership }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewCustomerBody {
    pub user_id: i64,
    #[serde(flatten)]
    pub fields: CustomerBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerPatch {
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub membership: Option<Membership>,
}

impl CustomerPatch {
    fn apply(self, mut body: CustomerBody) -> CustomerBody {
        if let Some(v) = self.phone { body.phone = v; }
        if let Some(v) = self.birth_date { body.birth_date = v; }
        if let Some(v) = self.membership { body.membership = v; }
        body
    }
}

async fn save(s: &AppState, id: i64, draft: CustomerDraft) -> Result<Customer> {
    let customer = s.store.update_customer(id, &draft).await?.ok_or(StoreError::NotFound)?;
    s.events.publish(DomainEvent::CustomerUpdated { customer_id: customer.id }).await;
    Ok(customer)
}

#[instrument(skip(s, identity))]
pub async fn create_customer(
    State(s): State<AppState>,
    identity: Identity,
    Payload(body): Payload<NewCustomerBody>,
) -> Result<(StatusCode, Json<Customer>)> {
    identity.staff()?;
    let draft = body.fields.into_draft()?;
    Ok((StatusCode::CREATED, Json(s.store.create_customer(body.user_id, &draft).await?)))
}

pub async fn get_customer(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<Json<Customer>> {
    identity.staff()?;
    Ok(Json(s.store.get_customer(id).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, identity))]
pub async fn update_customer(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(body): Payload<CustomerBody>,
) -> Result<Json<Customer>> {
    identity.staff()?;
    Ok(Json(save(&s, id, body.into_draft()?).await?))
}

#[instrument(skip(s, identity))]
pub async fn patch_customer(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(patch): Payload<CustomerPatch>,
) -> Result<Json<Customer>> {
    identity.staff()?;
    let current = s.store.get_customer(id).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(save(&s, id, patch.apply(current.into()).into_draft()?).await?))
}

pub async fn get_me(State(s): State<AppState>, identity: Identity) -> Result<Json<Customer>> {
    let user = identity.user()?;
    Ok(Json(s.store.customer_for_user(user.id).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, identity))]
pub async fn update_me(State(s): State<AppState>, identity: Identity, Payload(body): Payload<CustomerBody>) -> Result<Json<Customer>> {
    let user = identity.user()?;
    let customer = s.store.customer_for_user(user.id).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(save(&s, customer.id, body.into_draft()?).await?))
}

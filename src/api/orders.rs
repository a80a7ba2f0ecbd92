//! Orders placed from carts. Customers see their own; staff see and manage all.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::extract::{Identity, Ids, Payload};
use super::AppState;
use crate::domain::aggregates::{Customer, CustomerDraft, Order, User};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::PaymentStatus;
use crate::store::Store;
use crate::{Result, StoreError};

#[derive(Debug, Deserialize)]
pub struct NewOrderBody {
    pub cart_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub payment_status: PaymentStatus,
}

/// The caller's customer record, created on first use.
async fn customer_of(store: &dyn Store, user: &User) -> Result<Customer> {
    match store.customer_for_user(user.id).await? {
        Some(customer) => Ok(customer),
        None => store.create_customer(user.id, &CustomerDraft::default()).await,
    }
}

pub async fn list_orders(State(s): State<AppState>, identity: Identity) -> Result<Json<Vec<Order>>> {
    let user = identity.user()?;
    if user.is_staff {
        return Ok(Json(s.store.list_orders(None).await?));
    }
    match s.store.customer_for_user(user.id).await? {
        Some(customer) => Ok(Json(s.store.list_orders(Some(customer.id)).await?)),
        None => Ok(Json(Vec::new())),
    }
}

pub async fn get_order(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<Json<Order>> {
    let user = identity.user()?;
    let order = s.store.get_order(id).await?.ok_or(StoreError::NotFound)?;
    if !user.is_staff {
        let mine = s.store.customer_for_user(user.id).await?.is_some_and(|c| order.belongs_to(c.id));
        if !mine { return Err(StoreError::NotFound); }
    }
    Ok(Json(order))
}

#[instrument(skip(s, identity))]
pub async fn create_order(
    State(s): State<AppState>,
    identity: Identity,
    Payload(body): Payload<NewOrderBody>,
) -> Result<(StatusCode, Json<Order>)> {
    let user = identity.user()?;
    let customer = customer_of(s.store.as_ref(), user).await?;
    let order = s.store.place_order(customer.id, body.cart_id).await?;
    tracing::info!(order_id = order.id, customer_id = customer.id, "Order placed");
    s.events.publish(DomainEvent::OrderPlaced { order_id: order.id, customer_id: customer.id, total: order.total() }).await;
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(s, identity))]
pub async fn update_order(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(body): Payload<PaymentBody>,
) -> Result<Json<Order>> {
    identity.staff()?;
    Ok(Json(s.store.update_payment_status(id, body.payment_status).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, identity))]
pub async fn delete_order(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<StatusCode> {
    identity.staff()?;
    if !s.store.delete_order(id).await? { return Err(StoreError::NotFound); }
    Ok(StatusCode::NO_CONTENT)
}

//! Anonymous carts and their items. Items are only ever reached through their cart.

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::extract::{Ids, Payload};
use super::AppState;
use crate::domain::aggregates::{Cart, CartItem, CartLine};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Quantity;
use crate::store::messages;
use crate::{Result, StoreError};

#[derive(Debug, Deserialize)]
pub struct AddItemBody {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuantityBody {
    pub quantity: i32,
}

fn quantity(raw: i32) -> Result<Quantity> {
    Quantity::new(raw).map_err(|e| StoreError::field("quantity", e.to_string()))
}

#[instrument(skip(s))]
pub async fn create_cart(State(s): State<AppState>) -> Result<(StatusCode, Json<Cart>)> {
    let cart = s.store.create_cart().await?;
    tracing::debug!(cart_id = %cart.id(), "Cart created");
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn get_cart(State(s): State<AppState>, Ids(id): Ids<Uuid>) -> Result<Json<Cart>> {
    Ok(Json(s.store.get_cart(id).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s))]
pub async fn delete_cart(State(s): State<AppState>, Ids(id): Ids<Uuid>) -> Result<StatusCode> {
    if !s.store.delete_cart(id).await? { return Err(StoreError::NotFound); }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_items(State(s): State<AppState>, Ids(cart_id): Ids<Uuid>) -> Result<Json<Vec<CartLine>>> {
    Ok(Json(s.store.list_cart_items(cart_id).await?))
}

pub async fn get_item(State(s): State<AppState>, Ids((cart_id, id)): Ids<(Uuid, i64)>) -> Result<Json<CartLine>> {
    Ok(Json(s.store.get_cart_item(cart_id, id).await?.ok_or(StoreError::NotFound)?))
}

/// Adds a product to the cart, or raises the quantity of the line already holding it.
#[instrument(skip(s))]
pub async fn add_item(
    State(s): State<AppState>,
    Ids(cart_id): Ids<Uuid>,
    Payload(body): Payload<AddItemBody>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let qty = quantity(body.quantity)?;
    if s.store.get_product(body.product_id).await?.is_none() {
        return Err(StoreError::field("product_id", messages::NO_PRODUCT));
    }
    let item = s.store.add_cart_item(cart_id, body.product_id, qty).await?;
    s.events.publish(DomainEvent::CartItemAdded { cart_id, product_id: body.product_id, quantity: qty.value() }).await;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(s))]
pub async fn update_item(
    State(s): State<AppState>,
    Ids((cart_id, id)): Ids<(Uuid, i64)>,
    Payload(body): Payload<QuantityBody>,
) -> Result<Json<QuantityBody>> {
    let item = s.store.update_cart_item(cart_id, id, quantity(body.quantity)?).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(QuantityBody { quantity: item.quantity }))
}

#[instrument(skip(s))]
pub async fn delete_item(State(s): State<AppState>, Ids((cart_id, id)): Ids<(Uuid, i64)>) -> Result<StatusCode> {
    if !s.store.delete_cart_item(cart_id, id).await? { return Err(StoreError::NotFound); }
    Ok(StatusCode::NO_CONTENT)
}

/// Cart items are changed with `PATCH` only.
pub async fn replace_item() -> StoreError {
    StoreError::MethodNotAllowed(Method::PUT)
}

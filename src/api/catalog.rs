//! Products and collections. Reads are public; writes need a staff user.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationError};

use super::extract::{nullable, Identity, Ids, Params, Payload};
use super::pagination::{PageNumber, Paginated};
use super::AppState;
use crate::domain::aggregates::{Collection, Product, ProductDraft};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::UnitPrice;
use crate::store::{OrderTerm, ProductQuery};
use crate::{Result, StoreError};

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    product: Product,
    price_with_tax: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        let price_with_tax = product.price_with_tax();
        Self { product, price_with_tax }
    }
}

fn valid_unit_price(value: &Decimal) -> std::result::Result<(), ValidationError> {
    UnitPrice::new(*value).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("unit_price");
        err.message = Some(e.to_string().into());
        err
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductBody {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub inventory: i32,
    #[validate(custom = "valid_unit_price")]
    pub unit_price: Decimal,
    pub collection: i64,
}

impl ProductBody {
    fn into_draft(self) -> Result<ProductDraft> {
        self.validate()?;
        let unit_price = UnitPrice::new(self.unit_price).map_err(|e| StoreError::field("unit_price", e.to_string()))?;
        Ok(ProductDraft {
            title: self.title, slug: self.slug, description: self.description, inventory: self.inventory,
            unit_price, collection_id: self.collection,
        })
    }
}

impl From<Product> for ProductBody {
    fn from(p: Product) -> Self {
        Self { title: p.title, slug: p.slug, description: p.description, inventory: p.inventory, unit_price: p.unit_price, collection: p.collection_id }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub inventory: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub collection: Option<i64>,
}

impl ProductPatch {
    fn apply(self, mut body: ProductBody) -> ProductBody {
        if let Some(v) = self.title { body.title = v; }
        if let Some(v) = self.slug { body.slug = v; }
        if let Some(v) = self.description { body.description = v; }
        if let Some(v) = self.inventory { body.inventory = v; }
        if let Some(v) = self.unit_price { body.unit_price = v; }
        if let Some(v) = self.collection { body.collection = v; }
        body
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
    pub collection_id: Option<i64>,
    #[serde(rename = "unit_price__gt")]
    pub unit_price_gt: Option<Decimal>,
    #[serde(rename = "unit_price__lt")]
    pub unit_price_lt: Option<Decimal>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
}

impl ProductParams {
    fn query(&self, page: PageNumber) -> ProductQuery {
        ProductQuery {
            collection_id: self.collection_id,
            unit_price_gt: self.unit_price_gt,
            unit_price_lt: self.unit_price_lt,
            search: self.search.as_deref().unwrap_or_default().split_whitespace().map(str::to_string).collect(),
            ordering: self.ordering.as_deref().map(OrderTerm::parse_list).unwrap_or_default(),
            offset: page.offset(),
            limit: page.limit(),
        }
    }
}

pub async fn list_products(
    State(s): State<AppState>,
    Params(params): Params<ProductParams>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Paginated<ProductResponse>>> {
    let page = PageNumber::parse(params.page.as_deref())?;
    let found = s.store.list_products(&params.query(page)).await?;
    let results = found.items.into_iter().map(ProductResponse::from).collect();
    Ok(Json(page.paginate(found.count, results, &uri, &headers)?))
}

pub async fn get_product(State(s): State<AppState>, Ids(id): Ids<i64>) -> Result<Json<ProductResponse>> {
    let product = s.store.get_product(id).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(product.into()))
}

#[instrument(skip(s, identity, body))]
pub async fn create_product(
    State(s): State<AppState>,
    identity: Identity,
    Payload(body): Payload<ProductBody>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    identity.staff()?;
    let product = s.store.create_product(&body.into_draft()?).await?;
    tracing::info!(product_id = product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

#[instrument(skip(s, identity, body))]
pub async fn update_product(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(body): Payload<ProductBody>,
) -> Result<Json<ProductResponse>> {
    identity.staff()?;
    let product = s.store.update_product(id, &body.into_draft()?).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(product.into()))
}

#[instrument(skip(s, identity, patch))]
pub async fn patch_product(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(patch): Payload<ProductPatch>,
) -> Result<Json<ProductResponse>> {
    identity.staff()?;
    let current = s.store.get_product(id).await?.ok_or(StoreError::NotFound)?;
    let draft = patch.apply(current.into()).into_draft()?;
    let product = s.store.update_product(id, &draft).await?.ok_or(StoreError::NotFound)?;
    Ok(Json(product.into()))
}

/// Refuses with 405 while any order item still references the product.
#[instrument(skip(s, identity))]
pub async fn delete_product(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<StatusCode> {
    identity.staff()?;
    match s.store.delete_product(id).await {
        Ok(true) => {}
        Ok(false) => return Err(StoreError::NotFound),
        Err(e @ StoreError::Protected(_)) => {
            tracing::info!(product_id = id, "Refusing to delete ordered product");
            return Err(e);
        }
        Err(e) => return Err(e),
    }
    s.events.publish(DomainEvent::ProductDeleted { product_id: id }).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionBody {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionPatch {
    pub title: Option<String>,
}

pub async fn list_collections(State(s): State<AppState>) -> Result<Json<Vec<Collection>>> {
    Ok(Json(s.store.list_collections().await?))
}

pub async fn get_collection(State(s): State<AppState>, Ids(id): Ids<i64>) -> Result<Json<Collection>> {
    Ok(Json(s.store.get_collection(id).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, identity, body))]
pub async fn create_collection(
    State(s): State<AppState>,
    identity: Identity,
    Payload(body): Payload<CollectionBody>,
) -> Result<(StatusCode, Json<Collection>)> {
    identity.staff()?;
    body.validate()?;
    Ok((StatusCode::CREATED, Json(s.store.create_collection(&body.title).await?)))
}

#[instrument(skip(s, identity, body))]
pub async fn update_collection(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(body): Payload<CollectionBody>,
) -> Result<Json<Collection>> {
    identity.staff()?;
    body.validate()?;
    Ok(Json(s.store.update_collection(id, &body.title).await?.ok_or(StoreError::NotFound)?))
}

#[instrument(skip(s, identity, patch))]
pub async fn patch_collection(
    State(s): State<AppState>,
    identity: Identity,
    Ids(id): Ids<i64>,
    Payload(patch): Payload<CollectionPatch>,
) -> Result<Json<Collection>> {
    identity.staff()?;
    let current = s.store.get_collection(id).await?.ok_or(StoreError::NotFound)?;
    let body = CollectionBody { title: patch.title.unwrap_or(current.title) };
    body.validate()?;
    Ok(Json(s.store.update_collection(id, &body.title).await?.ok_or(StoreError::NotFound)?))
}

/// Refuses with 405 while any product still belongs to the collection.
#[instrument(skip(s, identity))]
pub async fn delete_collection(State(s): State<AppState>, identity: Identity, Ids(id): Ids<i64>) -> Result<StatusCode> {
    identity.staff()?;
    if !s.store.delete_collection(id).await? { return Err(StoreError::NotFound); }
    s.events.publish(DomainEvent::CollectionDeleted { collection_id: id }).await;
    Ok(StatusCode::NO_CONTENT)
}

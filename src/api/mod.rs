//! HTTP surface: routing table and shared handler state.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::publisher::EventPublisher;
use crate::store::Store;

pub mod accounts;
pub mod admin;
pub mod carts;
pub mod catalog;
pub mod customers;
pub mod extract;
pub mod orders;
pub mod pagination;
pub mod reviews;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: Arc<JwtKeys>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt: JwtKeys, events: EventPublisher) -> Self {
        Self { store, jwt: Arc::new(jwt), events }
    }
}

/// Builds the full router. Paths carry no trailing slash; wrap the result in
/// `NormalizePathLayer::trim_trailing_slash` to also accept `/products/`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/collections", get(catalog::list_collections).post(catalog::create_collection))
        .route("/collections/:id", get(catalog::get_collection).put(catalog::update_collection).patch(catalog::patch_collection).delete(catalog::delete_collection))
        .route("/products", get(catalog::list_products).post(catalog::create_product))
        .route("/products/:id", get(catalog::get_product).put(catalog::update_product).patch(catalog::patch_product).delete(catalog::delete_product))
        .route("/products/:id/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route("/products/:id/reviews/:review_id", get(reviews::get_review).put(reviews::update_review).patch(reviews::patch_review).delete(reviews::delete_review))
        .route("/carts", post(carts::create_cart))
        .route("/carts/:id", get(carts::get_cart).delete(carts::delete_cart))
        .route("/carts/:id/items", get(carts::list_items).post(carts::add_item))
        .route("/carts/:id/items/:item_id", get(carts::get_item).patch(carts::update_item).delete(carts::delete_item).put(carts::replace_item))
        .route("/customers", post(customers::create_customer))
        .route("/customers/me", get(customers::get_me).put(customers::update_me))
        .route("/customers/:id", get(customers::get_customer).put(customers::update_customer).patch(customers::patch_customer))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order).patch(orders::update_order).delete(orders::delete_order))
        .route("/auth/users", post(accounts::register))
        .route("/auth/users/me", get(accounts::me))
        .route("/auth/jwt/create", post(accounts::create_token))
        .route("/auth/jwt/refresh", post(accounts::refresh_token))
        .route("/admin/users", post(admin::add_user))
        .route("/admin/tags", get(admin::search_tags))
        .route("/admin/products/:id/tags", get(admin::product_tags).post(admin::tag_product))
        .route("/admin/products/:id/tags/:tagged_item_id", delete(admin::untag_product))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

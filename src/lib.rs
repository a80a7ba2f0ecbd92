//! Storefront REST API
//!
//! Catalog, reviews, anonymous carts, customers and orders for a small shop.
//!
//! ## Features
//! - Products and collections with filtering, search, ordering and paging
//! - Carts identified by UUID, with quantity-merging cart items
//! - JWT accounts; customer profiles created with every account
//! - Orders placed atomically from a cart
//! - Staff back office for users and product tags
//!
//! Storage sits behind [`store::Store`]: Postgres when `DATABASE_URL` is set,
//! an in-memory store otherwise.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod publisher;
pub mod store;

pub use api::{router, AppState};
pub use error::{Result, StoreError};

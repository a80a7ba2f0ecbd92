//! Persistence seam.
//!
//! Handlers talk to a [`Store`]; [`PgStore`] backs production and
//! [`MemoryStore`] backs tests and database-less local runs. Both enforce the
//! same scoping rules: reviews belong to their product, cart items to their
//! cart, and every lookup by a nested id also checks the parent id.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartItem, CartLine, Collection, Customer, CustomerDraft, NewUser, Order, Product, ProductDraft, Review,
    ReviewDraft, Tag, TaggedItem, User,
};
use crate::domain::value_objects::{PaymentStatus, Quantity};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Columns a product listing may be ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductOrder {
    UnitPrice,
    LastUpdate,
}

impl ProductOrder {
    pub fn column(&self) -> &'static str {
        match self { Self::UnitPrice => "unit_price", Self::LastUpdate => "last_update" }
    }
}

/// One term of an `ordering` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTerm { pub field: ProductOrder, pub descending: bool }

impl OrderTerm {
    /// Parses `unit_price,-last_update`; unknown fields are dropped.
    pub fn parse_list(raw: &str) -> Vec<OrderTerm> {
        raw.split(',')
            .map(str::trim)
            .filter_map(|term| {
                let (descending, name) = match term.strip_prefix('-') { Some(rest) => (true, rest), None => (false, term) };
                let field = match name {
                    "unit_price" => ProductOrder::UnitPrice,
                    "last_update" => ProductOrder::LastUpdate,
                    _ => return None,
                };
                Some(OrderTerm { field, descending })
            })
            .collect()
    }
}

/// Filters, search, ordering and paging for a product listing.
#[derive(Clone, Debug, Default)]
pub struct ProductQuery {
    pub collection_id: Option<i64>,
    pub unit_price_gt: Option<Decimal>,
    pub unit_price_lt: Option<Decimal>,
    pub search: Vec<String>,
    pub ordering: Vec<OrderTerm>,
    pub offset: i64,
    pub limit: i64,
}

impl ProductQuery {
    pub fn matches(&self, p: &Product) -> bool {
        self.collection_id.map_or(true, |c| p.collection_id == c)
            && self.unit_price_gt.map_or(true, |v| p.unit_price > v)
            && self.unit_price_lt.map_or(true, |v| p.unit_price < v)
            && p.matches_search(&self.search)
    }
}

/// One page of results plus the unpaged total.
#[derive(Clone, Debug)]
pub struct Page<T> { pub count: i64, pub items: Vec<T> }

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<Collection>>;
    async fn get_collection(&self, id: i64) -> Result<Option<Collection>>;
    async fn create_collection(&self, title: &str) -> Result<Collection>;
    async fn update_collection(&self, id: i64, title: &str) -> Result<Option<Collection>>;
    /// Refuses with [`StoreError::Protected`] while any product belongs to the collection.
    async fn delete_collection(&self, id: i64) -> Result<bool>;

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>>;
    async fn get_product(&self, id: i64) -> Result<Option<Product>>;
    async fn create_product(&self, draft: &ProductDraft) -> Result<Product>;
    async fn update_product(&self, id: i64, draft: &ProductDraft) -> Result<Option<Product>>;
    /// Refuses with [`StoreError::Protected`] while any order item references the product.
    async fn delete_product(&self, id: i64) -> Result<bool>;

    async fn list_reviews(&self, product_id: i64) -> Result<Vec<Review>>;
    async fn get_review(&self, product_id: i64, id: i64) -> Result<Option<Review>>;
    async fn create_review(&self, product_id: i64, draft: &ReviewDraft) -> Result<Review>;
    async fn update_review(&self, product_id: i64, id: i64, draft: &ReviewDraft) -> Result<Option<Review>>;
    async fn delete_review(&self, product_id: i64, id: i64) -> Result<bool>;

    async fn create_cart(&self) -> Result<Cart>;
    async fn get_cart(&self, id: Uuid) -> Result<Option<Cart>>;
    async fn delete_cart(&self, id: Uuid) -> Result<bool>;

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>>;
    async fn get_cart_item(&self, cart_id: Uuid, id: i64) -> Result<Option<CartLine>>;
    /// Adds `quantity` of a product, merging into an existing line for the same product.
    async fn add_cart_item(&self, cart_id: Uuid, product_id: i64, quantity: Quantity) -> Result<CartItem>;
    async fn update_cart_item(&self, cart_id: Uuid, id: i64, quantity: Quantity) -> Result<Option<CartItem>>;
    async fn delete_cart_item(&self, cart_id: Uuid, id: i64) -> Result<bool>;

    /// Fails with a `username` validation error when the name is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    /// Fails with a `user_id` validation error when the user is missing or already has a customer.
    async fn create_customer(&self, user_id: i64, draft: &CustomerDraft) -> Result<Customer>;
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>>;
    async fn customer_for_user(&self, user_id: i64) -> Result<Option<Customer>>;
    async fn update_customer(&self, id: i64, draft: &CustomerDraft) -> Result<Option<Customer>>;

    /// Orders of one customer, or of everyone when `customer_id` is `None`.
    async fn list_orders(&self, customer_id: Option<i64>) -> Result<Vec<Order>>;
    async fn get_order(&self, id: i64) -> Result<Option<Order>>;
    /// Turns the cart into an order and deletes the cart, atomically.
    async fn place_order(&self, customer_id: i64, cart_id: Uuid) -> Result<Order>;
    async fn update_payment_status(&self, id: i64, status: PaymentStatus) -> Result<Option<Order>>;
    async fn delete_order(&self, id: i64) -> Result<bool>;

    async fn search_tags(&self, search: Option<&str>) -> Result<Vec<Tag>>;
    async fn tags_for(&self, content_type: &str, object_id: i64) -> Result<Vec<TaggedItem>>;
    /// Links the tag with `label` to the object, creating the tag when missing.
    async fn tag_object(&self, label: &str, content_type: &str, object_id: i64) -> Result<TaggedItem>;
    async fn untag(&self, content_type: &str, object_id: i64, tagged_item_id: i64) -> Result<bool>;
}

/// Messages shared by both backends.
pub(crate) mod messages {
    pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
    pub const NO_USER: &str = "No user with the given ID was found.";
    pub const CUSTOMER_EXISTS: &str = "customer with this user already exists.";
    pub const NO_CART: &str = "No cart with the given ID was found.";
    pub const NO_PRODUCT: &str = "No product with the given ID was found.";
    pub const PRODUCT_PROTECTED: &str = "Product Can not be deleted!";
    pub const COLLECTION_PROTECTED: &str = "Collection can not be deleted!";
}

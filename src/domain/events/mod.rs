//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    ProductDeleted { product_id: i64 },
    CollectionDeleted { collection_id: i64 },
    CartItemAdded { cart_id: Uuid, product_id: i64, quantity: i32 },
    OrderPlaced { order_id: i64, customer_id: i64, total: Decimal },
    CustomerUpdated { customer_id: i64 },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ProductDeleted { .. } => "storefront.product_deleted",
            Self::CollectionDeleted { .. } => "storefront.collection_deleted",
            Self::CartItemAdded { .. } => "storefront.cart_item_added",
            Self::OrderPlaced { .. } => "storefront.order_placed",
            Self::CustomerUpdated { .. } => "storefront.customer_updated",
        }
    }
}

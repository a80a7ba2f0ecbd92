//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::ProductSummary;

/// An anonymous shopping cart together with its lines.
#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    id: Uuid,
    #[serde(skip)]
    created_at: DateTime<Utc>,
    items: Vec<CartLine>,
    total_price: Decimal,
}

/// A cart item with its product expanded.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub id: i64,
    pub product: ProductSummary,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl CartLine {
    pub fn new(id: i64, product: ProductSummary, quantity: i32) -> Self {
        let total_price = product.unit_price * Decimal::from(quantity);
        Self { id, product, quantity, total_price }
    }
}

/// A stored cart item row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: i64,
    #[serde(skip)]
    pub cart_id: Uuid,
    pub product_id: i64,
    pub quantity: i32,
}

impl Cart {
    pub fn new() -> Self { Self::assemble(Uuid::new_v4(), Utc::now(), vec![]) }

    pub fn assemble(id: Uuid, created_at: DateTime<Utc>, items: Vec<CartLine>) -> Self {
        let mut cart = Self { id, created_at, items, total_price: Decimal::ZERO };
        cart.recalculate();
        cart
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    fn recalculate(&mut self) {
        self.total_price = self.items.iter().fold(Decimal::new(0, 2), |acc, i| acc + i.total_price);
    }
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, cents: i64) -> ProductSummary {
        ProductSummary { id, title: format!("P{id}"), unit_price: Decimal::new(cents, 2) }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::assemble(Uuid::new_v4(), Utc::now(), vec![CartLine::new(1, summary(1, 1000), 2), CartLine::new(2, summary(2, 250), 3)]);
        assert_eq!(cart.items()[0].total_price.to_string(), "20.00");
        assert_eq!(cart.total_price().to_string(), "27.50");
    }

    #[test]
    fn test_empty_cart_serializes_zero_total() {
        let json = serde_json::to_value(Cart::new()).unwrap();
        assert_eq!(json["items"], serde_json::json!([]));
        assert_eq!(json["total_price"], "0.00");
        assert!(json.get("created_at").is_none());
    }
}

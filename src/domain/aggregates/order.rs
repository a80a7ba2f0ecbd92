//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use crate::domain::aggregates::{Cart, ProductSummary};
use crate::domain::value_objects::PaymentStatus;

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: i64,
    #[serde(rename = "customer")]
    pub customer_id: i64,
    pub placed_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderLine { pub id: i64, pub product: ProductSummary, pub unit_price: Decimal, pub quantity: i32 }

/// An order line about to be written; the unit price is frozen at placement time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineDraft { pub product: ProductSummary, pub quantity: i32 }

impl Order {
    /// Lines an order placed from `cart` must contain.
    pub fn lines_from_cart(cart: &Cart) -> Result<Vec<LineDraft>, OrderError> {
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        Ok(cart.items().iter().map(|i| LineDraft { product: i.product.clone(), quantity: i.quantity }).collect())
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().fold(Decimal::new(0, 2), |acc, i| acc + i.unit_price * Decimal::from(i.quantity))
    }

    pub fn belongs_to(&self, customer_id: i64) -> bool { self.customer_id == customer_id }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { EmptyCart }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "The cart is empty.") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CartLine;
    use uuid::Uuid;

    #[test]
    fn test_lines_from_cart() {
        let product = ProductSummary { id: 4, title: "Widget".into(), unit_price: Decimal::new(1250, 2) };
        let cart = Cart::assemble(Uuid::new_v4(), Utc::now(), vec![CartLine::new(1, product.clone(), 2)]);
        let lines = Order::lines_from_cart(&cart).unwrap();
        assert_eq!(lines, vec![LineDraft { product: product.clone(), quantity: 2 }]);

        let order = Order {
            id: 1, customer_id: 9, placed_at: Utc::now(), payment_status: PaymentStatus::Pending,
            items: vec![OrderLine { id: 1, product, unit_price: Decimal::new(1250, 2), quantity: 2 }],
        };
        assert_eq!(order.total().to_string(), "25.00");
        assert!(order.belongs_to(9));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(Order::lines_from_cart(&Cart::new()).unwrap_err(), OrderError::EmptyCart);
    }
}

//! Product and Collection aggregates

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{UnitPrice, TAX_RATE};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub inventory: i32,
    pub unit_price: Decimal,
    #[serde(rename = "collection")]
    pub collection_id: i64,
    #[serde(skip_serializing)]
    pub last_update: DateTime<Utc>,
}

impl Product {
    pub fn price_with_tax(&self) -> Decimal { (self.unit_price * TAX_RATE).round_dp(2) }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary { id: self.id, title: self.title.clone(), unit_price: self.unit_price }
    }

    /// Whether every search term occurs in the title or the description, ignoring case.
    pub fn matches_search(&self, terms: &[String]) -> bool {
        let title = self.title.to_lowercase();
        let description = self.description.as_deref().unwrap_or_default().to_lowercase();
        terms.iter().all(|t| {
            let t = t.to_lowercase();
            title.contains(&t) || description.contains(&t)
        })
    }
}

/// The short product shape embedded in cart and order lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary { pub id: i64, pub title: String, pub unit_price: Decimal }

/// Validated field values for creating or replacing a product.
#[derive(Clone, Debug)]
pub struct ProductDraft {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub inventory: i32,
    pub unit_price: UnitPrice,
    pub collection_id: i64,
}

impl ProductDraft {
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id, title: self.title, slug: self.slug, description: self.description, inventory: self.inventory,
            unit_price: self.unit_price.amount(), collection_id: self.collection_id, last_update: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: i64,
    pub title: String,
    pub products_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(title: &str, description: Option<&str>) -> Product {
        ProductDraft {
            title: title.into(), slug: "-".into(), description: description.map(Into::into), inventory: 3,
            unit_price: UnitPrice::new(Decimal::new(1000, 2)).unwrap(), collection_id: 1,
        }
        .into_product(7)
    }

    #[test]
    fn test_search_requires_every_term() {
        let p = product("Coffee Beans", Some("Dark roast from Kenya"));
        assert!(p.matches_search(&["coffee".into()]));
        assert!(p.matches_search(&["beans".into(), "KENYA".into()]));
        assert!(!p.matches_search(&["coffee".into(), "tea".into()]));
        assert!(product("Tea", None).matches_search(&[]));
    }

    #[test]
    fn test_serialized_shape() {
        let p = product("Mug", None);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["collection"], 1);
        assert_eq!(json["unit_price"], "10.00");
        assert!(json.get("last_update").is_none());
        assert_eq!(p.price_with_tax().to_string(), "11.00");
    }
}

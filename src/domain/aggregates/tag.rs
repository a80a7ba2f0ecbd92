//! Generic tags attachable to any catalog object

use serde::Serialize;

/// Content type name used when tagging products.
pub const PRODUCT_CONTENT_TYPE: &str = "product";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Tag { pub id: i64, pub label: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaggedItem {
    pub id: i64,
    pub tag: Tag,
    pub content_type: String,
    pub object_id: i64,
}

//! Review entity

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    #[serde(skip_serializing)]
    pub product_id: i64,
    pub date: NaiveDate,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct ReviewDraft { pub name: String, pub description: String }

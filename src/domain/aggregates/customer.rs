//! Customer and User entities

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use crate::domain::value_objects::Membership;

#[derive(Clone, Debug, Serialize)]
pub struct Customer {
    pub id: i64,
    pub user_id: i64,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: Membership,
}

/// Writable customer fields.
#[derive(Clone, Debug, Default)]
pub struct CustomerDraft {
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: Membership,
}

impl CustomerDraft {
    pub fn into_customer(self, id: i64, user_id: i64) -> Customer {
        Customer { id, user_id, phone: self.phone, birth_date: self.birth_date, membership: self.membership }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub is_staff: bool,
    #[serde(skip)]
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
}

impl NewUser {
    pub fn into_user(self, id: i64) -> User {
        User {
            id, username: self.username, email: self.email, first_name: self.first_name, last_name: self.last_name,
            password_hash: self.password_hash, is_staff: self.is_staff, date_joined: Utc::now(),
        }
    }
}

//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{messages, Page, ProductQuery, Store};
use crate::config::Config;
use crate::domain::aggregates::{
    Cart, CartItem, CartLine, Collection, Customer, CustomerDraft, NewUser, Order, OrderLine, Product, ProductDraft,
    ProductSummary, Review, ReviewDraft, Tag, TaggedItem, User, PRODUCT_CONTENT_TYPE,
};
use crate::domain::value_objects::{PaymentStatus, Quantity, QuantityError};
use crate::{Result, StoreError};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

const COLLECTION_SELECT: &str = "SELECT c.id, c.title, COUNT(p.id) AS products_count FROM collections c LEFT JOIN products p ON p.collection_id = c.id";

const CART_LINE_SELECT: &str = "SELECT ci.id, ci.quantity, p.id AS product_id, p.title, p.unit_price FROM cart_items ci JOIN products p ON p.id = ci.product_id";

#[derive(sqlx::FromRow)]
struct LineRow { id: i64, quantity: i32, product_id: i64, title: String, unit_price: Decimal }

impl LineRow {
    fn into_line(self) -> CartLine {
        CartLine::new(self.id, ProductSummary { id: self.product_id, title: self.title, unit_price: self.unit_price }, self.quantity)
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow { id: i64, user_id: i64, phone: String, birth_date: Option<NaiveDate>, membership: String }

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;
    fn try_from(row: CustomerRow) -> Result<Self> {
        let membership = row.membership.trim().parse().map_err(|e| StoreError::Internal(format!("customer {}: {e}", row.id)))?;
        Ok(Customer { id: row.id, user_id: row.user_id, phone: row.phone, birth_date: row.birth_date, membership })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow { id: i64, customer_id: i64, placed_at: DateTime<Utc>, payment_status: String }

#[derive(sqlx::FromRow)]
struct OrderLineRow { id: i64, order_id: i64, quantity: i32, unit_price: Decimal, product_id: i64, title: String, product_price: Decimal }

#[derive(sqlx::FromRow)]
struct TaggedRow { id: i64, tag_id: i64, label: String, content_type: String, object_id: i64 }

impl From<TaggedRow> for TaggedItem {
    fn from(row: TaggedRow) -> Self {
        TaggedItem { id: row.id, tag: Tag { id: row.tag_id, label: row.label }, content_type: row.content_type, object_id: row.object_id }
    }
}

fn violates(e: &sqlx::Error, code: &str) -> bool {
    e.as_database_error().and_then(|d| d.code()).map_or(false, |c| c == code)
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(c) = q.collection_id { qb.push(" AND collection_id = ").push_bind(c); }
    if let Some(v) = q.unit_price_gt { qb.push(" AND unit_price > ").push_bind(v); }
    if let Some(v) = q.unit_price_lt { qb.push(" AND unit_price < ").push_bind(v); }
    for term in &q.search {
        let pattern = like_pattern(term);
        qb.push(" AND (title ILIKE ").push_bind(pattern.clone()).push(" OR description ILIKE ").push_bind(pattern).push(")");
    }
}

/// Maps a RESTRICT violation on delete to the refusal the API reports.
fn protected(e: sqlx::Error, message: &'static str) -> StoreError {
    if violates(&e, FOREIGN_KEY_VIOLATION) { StoreError::Protected(message) } else { e.into() }
}

fn bad_collection(e: sqlx::Error, collection_id: i64) -> StoreError {
    if violates(&e, FOREIGN_KEY_VIOLATION) {
        return StoreError::field("collection", format!("Invalid pk \"{collection_id}\" - object does not exist."));
    }
    e.into()
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Connects using the configured URL and pool size, then applies pending migrations.
    pub async fn connect(config: &Config, url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(config.db_max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
        Ok(Self::new(pool))
    }

    async fn order_lines(&self, order_ids: &[i64]) -> Result<Vec<OrderLineRow>> {
        Ok(sqlx::query_as::<_, OrderLineRow>(
            "SELECT oi.id, oi.order_id, oi.quantity, oi.unit_price, p.id AS product_id, p.title, p.unit_price AS product_price \
             FROM order_items oi JOIN products p ON p.id = oi.product_id WHERE oi.order_id = ANY($1) ORDER BY oi.id",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn assemble_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let lines = self.order_lines(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let payment_status = row.payment_status.trim().parse().map_err(|e| StoreError::Internal(format!("order {}: {e}", row.id)))?;
                let items = lines
                    .iter()
                    .filter(|l| l.order_id == row.id)
                    .map(|l| OrderLine {
                        id: l.id,
                        product: ProductSummary { id: l.product_id, title: l.title.clone(), unit_price: l.product_price },
                        unit_price: l.unit_price,
                        quantity: l.quantity,
                    })
                    .collect();
                Ok(Order { id: row.id, customer_id: row.customer_id, placed_at: row.placed_at, payment_status, items })
            })
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(sqlx::query_as::<_, Collection>(&format!("{COLLECTION_SELECT} GROUP BY c.id ORDER BY c.id")).fetch_all(&self.pool).await?)
    }

    async fn get_collection(&self, id: i64) -> Result<Option<Collection>> {
        Ok(sqlx::query_as::<_, Collection>(&format!("{COLLECTION_SELECT} WHERE c.id = $1 GROUP BY c.id"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_collection(&self, title: &str) -> Result<Collection> {
        Ok(sqlx::query_as::<_, Collection>("INSERT INTO collections (title) VALUES ($1) RETURNING id, title, 0::BIGINT AS products_count")
            .bind(title)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_collection(&self, id: i64, title: &str) -> Result<Option<Collection>> {
        let updated = sqlx::query("UPDATE collections SET title = $2 WHERE id = $1").bind(id).bind(title).execute(&self.pool).await?;
        if updated.rows_affected() == 0 { return Ok(None); }
        self.get_collection(id).await
    }

    async fn delete_collection(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| protected(e, messages::COLLECTION_PROTECTED))?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count_qb, query);
        let count = count_qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_product_filters(&mut qb, query);
        qb.push(" ORDER BY ");
        for term in &query.ordering {
            qb.push(term.field.column()).push(if term.descending { " DESC, " } else { " ASC, " });
        }
        qb.push("title ASC, id ASC LIMIT ").push_bind(query.limit).push(" OFFSET ").push_bind(query.offset);
        let items = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(Page { count, items })
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_product(&self, d: &ProductDraft) -> Result<Product> {
        sqlx::query_as::<_, Product>("INSERT INTO products (title, slug, description, unit_price, inventory, collection_id, last_update) VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING *")
            .bind(&d.title).bind(&d.slug).bind(&d.description).bind(d.unit_price.amount()).bind(d.inventory).bind(d.collection_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| bad_collection(e, d.collection_id))
    }

    async fn update_product(&self, id: i64, d: &ProductDraft) -> Result<Option<Product>> {
        sqlx::query_as::<_, Product>("UPDATE products SET title = $2, slug = $3, description = $4, unit_price = $5, inventory = $6, collection_id = $7, last_update = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(&d.title).bind(&d.slug).bind(&d.description).bind(d.unit_price.amount()).bind(d.inventory).bind(d.collection_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| bad_collection(e, d.collection_id))
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tagged_items WHERE content_type = $1 AND object_id = $2").bind(PRODUCT_CONTENT_TYPE).bind(id).execute(&mut *tx).await?;
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| protected(e, messages::PRODUCT_PROTECTED))?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_reviews(&self, product_id: i64) -> Result<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE product_id = $1 ORDER BY id").bind(product_id).fetch_all(&self.pool).await?)
    }

    async fn get_review(&self, product_id: i64, id: i64) -> Result<Option<Review>> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE product_id = $1 AND id = $2").bind(product_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_review(&self, product_id: i64, d: &ReviewDraft) -> Result<Review> {
        sqlx::query_as::<_, Review>("INSERT INTO reviews (product_id, name, description) VALUES ($1, $2, $3) RETURNING *")
            .bind(product_id).bind(&d.name).bind(&d.description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| if violates(&e, FOREIGN_KEY_VIOLATION) { StoreError::NotFound } else { e.into() })
    }

    async fn update_review(&self, product_id: i64, id: i64, d: &ReviewDraft) -> Result<Option<Review>> {
        Ok(sqlx::query_as::<_, Review>("UPDATE reviews SET name = $3, description = $4 WHERE product_id = $1 AND id = $2 RETURNING *")
            .bind(product_id).bind(id).bind(&d.name).bind(&d.description)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_review(&self, product_id: i64, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE product_id = $1 AND id = $2").bind(product_id).bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_cart(&self) -> Result<Cart> {
        let cart = Cart::new();
        sqlx::query("INSERT INTO carts (id, created_at) VALUES ($1, $2)").bind(cart.id()).bind(cart.created_at()).execute(&self.pool).await?;
        Ok(cart)
    }

    async fn get_cart(&self, id: Uuid) -> Result<Option<Cart>> {
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT created_at FROM carts WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        let Some(created_at) = created_at else { return Ok(None) };
        Ok(Some(Cart::assemble(id, created_at, self.list_cart_items(id).await?)))
    }

    async fn delete_cart(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!("{CART_LINE_SELECT} WHERE ci.cart_id = $1 ORDER BY ci.id")).bind(cart_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(LineRow::into_line).collect())
    }

    async fn get_cart_item(&self, cart_id: Uuid, id: i64) -> Result<Option<CartLine>> {
        let row = sqlx::query_as::<_, LineRow>(&format!("{CART_LINE_SELECT} WHERE ci.cart_id = $1 AND ci.id = $2"))
            .bind(cart_id).bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LineRow::into_line))
    }

    async fn add_cart_item(&self, cart_id: Uuid, product_id: i64, quantity: Quantity) -> Result<CartItem> {
        let cart_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM carts WHERE id = $1)").bind(cart_id).fetch_one(&self.pool).await?;
        if !cart_exists { return Err(StoreError::NotFound); }
        sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING id, cart_id, product_id, quantity",
        )
        .bind(cart_id).bind(product_id).bind(quantity.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, NUMERIC_OUT_OF_RANGE) { return StoreError::field("quantity", QuantityError::TooLarge.to_string()); }
            let constraint = e.as_database_error().and_then(|d| d.constraint()).map(str::to_owned);
            match constraint.as_deref() {
                Some("cart_items_product_id_fkey") => StoreError::field("product_id", messages::NO_PRODUCT),
                Some("cart_items_cart_id_fkey") => StoreError::NotFound,
                _ => e.into(),
            }
        })
    }

    async fn update_cart_item(&self, cart_id: Uuid, id: i64, quantity: Quantity) -> Result<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND id = $2 RETURNING id, cart_id, product_id, quantity")
            .bind(cart_id).bind(id).bind(quantity.value())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_cart_item(&self, cart_id: Uuid, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2").bind(cart_id).bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_user(&self, u: &NewUser) -> Result<User> {
        sqlx::query_as::<_, User>("INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *")
            .bind(&u.username).bind(&u.email).bind(&u.first_name).bind(&u.last_name).bind(&u.password_hash).bind(u.is_staff)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| if violates(&e, UNIQUE_VIOLATION) { StoreError::field("username", messages::USERNAME_TAKEN) } else { e.into() })
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1").bind(username).fetch_optional(&self.pool).await?)
    }

    async fn create_customer(&self, user_id: i64, d: &CustomerDraft) -> Result<Customer> {
        sqlx::query_as::<_, CustomerRow>("INSERT INTO customers (user_id, phone, birth_date, membership) VALUES ($1, $2, $3, $4) RETURNING *")
            .bind(user_id).bind(&d.phone).bind(d.birth_date).bind(d.membership.code())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, UNIQUE_VIOLATION) { return StoreError::field("user_id", messages::CUSTOMER_EXISTS); }
                if violates(&e, FOREIGN_KEY_VIOLATION) { return StoreError::field("user_id", messages::NO_USER); }
                e.into()
            })?
            .try_into()
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(Customer::try_from).transpose()
    }

    async fn customer_for_user(&self, user_id: i64) -> Result<Option<Customer>> {
        sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE user_id = $1").bind(user_id).fetch_optional(&self.pool).await?.map(Customer::try_from).transpose()
    }

    async fn update_customer(&self, id: i64, d: &CustomerDraft) -> Result<Option<Customer>> {
        sqlx::query_as::<_, CustomerRow>("UPDATE customers SET phone = $2, birth_date = $3, membership = $4 WHERE id = $1 RETURNING *")
            .bind(id).bind(&d.phone).bind(d.birth_date).bind(d.membership.code())
            .fetch_optional(&self.pool)
            .await?
            .map(Customer::try_from)
            .transpose()
    }

    async fn list_orders(&self, customer_id: Option<i64>) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE $1::BIGINT IS NULL OR customer_id = $1 ORDER BY id")
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        self.assemble_orders(rows).await
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_all(&self.pool).await?;
        Ok(self.assemble_orders(rows).await?.pop())
    }

    async fn place_order(&self, customer_id: i64, cart_id: Uuid) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT created_at FROM carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::field("cart_id", messages::NO_CART))?;
        let lines = sqlx::query_as::<_, LineRow>(&format!("{CART_LINE_SELECT} WHERE ci.cart_id = $1 ORDER BY ci.id"))
            .bind(cart_id)
            .fetch_all(&mut *tx)
            .await?;
        let cart = Cart::assemble(cart_id, created_at, lines.into_iter().map(LineRow::into_line).collect());
        let drafts = Order::lines_from_cart(&cart).map_err(|e| StoreError::field("cart_id", e.to_string()))?;

        let order_id = sqlx::query_scalar::<_, i64>("INSERT INTO orders (customer_id, payment_status) VALUES ($1, $2) RETURNING id")
            .bind(customer_id)
            .bind(PaymentStatus::Pending.code())
            .fetch_one(&mut *tx)
            .await?;
        for line in &drafts {
            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
                .bind(order_id).bind(line.product.id).bind(line.quantity).bind(line.product.unit_price)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;
        tx.commit().await?;

        self.get_order(order_id).await?.ok_or_else(|| StoreError::Internal(format!("order {order_id} missing after commit")))
    }

    async fn update_payment_status(&self, id: i64, status: PaymentStatus) -> Result<Option<Order>> {
        let updated = sqlx::query("UPDATE orders SET payment_status = $2 WHERE id = $1").bind(id).bind(status.code()).execute(&self.pool).await?;
        if updated.rows_affected() == 0 { return Ok(None); }
        self.get_order(id).await
    }

    async fn delete_order(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn search_tags(&self, search: Option<&str>) -> Result<Vec<Tag>> {
        Ok(sqlx::query_as::<_, Tag>("SELECT id, label FROM tags WHERE $1::TEXT IS NULL OR label ILIKE $1 ORDER BY label")
            .bind(search.map(like_pattern))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn tags_for(&self, content_type: &str, object_id: i64) -> Result<Vec<TaggedItem>> {
        let rows = sqlx::query_as::<_, TaggedRow>(
            "SELECT ti.id, t.id AS tag_id, t.label, ti.content_type, ti.object_id FROM tagged_items ti JOIN tags t ON t.id = ti.tag_id \
             WHERE ti.content_type = $1 AND ti.object_id = $2 ORDER BY ti.id",
        )
        .bind(content_type).bind(object_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TaggedItem::from).collect())
    }

    async fn tag_object(&self, label: &str, content_type: &str, object_id: i64) -> Result<TaggedItem> {
        let mut tx = self.pool.begin().await?;
        let tag = sqlx::query_as::<_, Tag>("INSERT INTO tags (label) VALUES ($1) ON CONFLICT (label) DO UPDATE SET label = EXCLUDED.label RETURNING id, label")
            .bind(label)
            .fetch_one(&mut *tx)
            .await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tagged_items (tag_id, content_type, object_id) VALUES ($1, $2, $3) \
             ON CONFLICT (tag_id, content_type, object_id) DO UPDATE SET object_id = EXCLUDED.object_id RETURNING id",
        )
        .bind(tag.id).bind(content_type).bind(object_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(TaggedItem { id, tag, content_type: content_type.to_string(), object_id })
    }

    async fn untag(&self, content_type: &str, object_id: i64, tagged_item_id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM tagged_items WHERE id = $1 AND content_type = $2 AND object_id = $3")
            .bind(tagged_item_id).bind(content_type).bind(object_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}

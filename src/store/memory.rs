//! In-process store used by tests and database-less runs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{messages, Page, ProductOrder, ProductQuery, Store};
use crate::domain::aggregates::{
    Cart, CartItem, CartLine, Collection, Customer, CustomerDraft, NewUser, Order, OrderLine, Product, ProductDraft,
    Review, ReviewDraft, Tag, TaggedItem, User, PRODUCT_CONTENT_TYPE,
};
use crate::domain::value_objects::{PaymentStatus, Quantity};
use crate::{Result, StoreError};

#[derive(Clone, Debug)]
struct OrderRow { id: i64, customer_id: i64, placed_at: DateTime<Utc>, payment_status: PaymentStatus }

#[derive(Clone, Debug)]
struct OrderItemRow { id: i64, order_id: i64, product_id: i64, quantity: i32, unit_price: Decimal }

#[derive(Clone, Debug)]
struct TaggedRow { id: i64, tag_id: i64, content_type: String, object_id: i64 }

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    collections: BTreeMap<i64, String>,
    products: BTreeMap<i64, Product>,
    reviews: BTreeMap<i64, Review>,
    carts: HashMap<Uuid, DateTime<Utc>>,
    cart_items: BTreeMap<i64, CartItem>,
    users: BTreeMap<i64, User>,
    customers: BTreeMap<i64, Customer>,
    orders: BTreeMap<i64, OrderRow>,
    order_items: BTreeMap<i64, OrderItemRow>,
    tags: BTreeMap<i64, Tag>,
    tagged_items: BTreeMap<i64, TaggedRow>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn collection(&self, id: i64) -> Option<Collection> {
        let title = self.collections.get(&id)?;
        let products_count = self.products.values().filter(|p| p.collection_id == id).count() as i64;
        Some(Collection { id, title: title.clone(), products_count })
    }

    fn check_collection(&self, id: i64) -> Result<()> {
        if self.collections.contains_key(&id) { Ok(()) } else { Err(StoreError::field("collection", format!("Invalid pk \"{id}\" - object does not exist."))) }
    }

    fn cart_line(&self, item: &CartItem) -> Option<CartLine> {
        let product = self.products.get(&item.product_id)?;
        Some(CartLine::new(item.id, product.summary(), item.quantity))
    }

    fn cart_lines(&self, cart_id: Uuid) -> Vec<CartLine> {
        self.cart_items.values().filter(|i| i.cart_id == cart_id).filter_map(|i| self.cart_line(i)).collect()
    }

    fn cart(&self, id: Uuid) -> Option<Cart> {
        let created_at = *self.carts.get(&id)?;
        Some(Cart::assemble(id, created_at, self.cart_lines(id)))
    }

    fn order(&self, row: &OrderRow) -> Order {
        let items = self
            .order_items
            .values()
            .filter(|i| i.order_id == row.id)
            .filter_map(|i| {
                let product = self.products.get(&i.product_id)?.summary();
                Some(OrderLine { id: i.id, product, unit_price: i.unit_price, quantity: i.quantity })
            })
            .collect();
        Order { id: row.id, customer_id: row.customer_id, placed_at: row.placed_at, payment_status: row.payment_status, items }
    }

    fn tagged(&self, row: &TaggedRow) -> Option<TaggedItem> {
        let tag = self.tags.get(&row.tag_id)?.clone();
        Some(TaggedItem { id: row.id, tag, content_type: row.content_type.clone(), object_id: row.object_id })
    }
}

/// A [`Store`] holding everything in memory behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn compare_products(a: &Product, b: &Product, query: &ProductQuery) -> Ordering {
    for term in &query.ordering {
        let ord = match term.field {
            ProductOrder::UnitPrice => a.unit_price.cmp(&b.unit_price),
            ProductOrder::LastUpdate => a.last_update.cmp(&b.last_update),
        };
        let ord = if term.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal { return ord; }
    }
    a.title.cmp(&b.title).then(a.id.cmp(&b.id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let t = self.tables.read();
        Ok(t.collections.keys().filter_map(|id| t.collection(*id)).collect())
    }

    async fn get_collection(&self, id: i64) -> Result<Option<Collection>> {
        Ok(self.tables.read().collection(id))
    }

    async fn create_collection(&self, title: &str) -> Result<Collection> {
        let mut t = self.tables.write();
        let id = t.next_id("collections");
        t.collections.insert(id, title.to_string());
        Ok(Collection { id, title: title.to_string(), products_count: 0 })
    }

    async fn update_collection(&self, id: i64, title: &str) -> Result<Option<Collection>> {
        let mut t = self.tables.write();
        match t.collections.get_mut(&id) {
            Some(existing) => *existing = title.to_string(),
            None => return Ok(None),
        }
        Ok(t.collection(id))
    }

    async fn delete_collection(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        if t.products.values().any(|p| p.collection_id == id) {
            return Err(StoreError::Protected(messages::COLLECTION_PROTECTED));
        }
        Ok(t.collections.remove(&id).is_some())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>> {
        let t = self.tables.read();
        let mut matching: Vec<Product> = t.products.values().filter(|p| query.matches(p)).cloned().collect();
        matching.sort_by(|a, b| compare_products(a, b, query));
        let count = matching.len() as i64;
        let items = matching.into_iter().skip(query.offset.max(0) as usize).take(query.limit.max(0) as usize).collect();
        Ok(Page { count, items })
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product> {
        let mut t = self.tables.write();
        t.check_collection(draft.collection_id)?;
        let id = t.next_id("products");
        let product = draft.clone().into_product(id);
        t.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: i64, draft: &ProductDraft) -> Result<Option<Product>> {
        let mut t = self.tables.write();
        if !t.products.contains_key(&id) { return Ok(None); }
        t.check_collection(draft.collection_id)?;
        let product = draft.clone().into_product(id);
        t.products.insert(id, product.clone());
        Ok(Some(product))
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        if t.order_items.values().any(|i| i.product_id == id) {
            return Err(StoreError::Protected(messages::PRODUCT_PROTECTED));
        }
        if t.products.remove(&id).is_none() { return Ok(false); }
        t.reviews.retain(|_, r| r.product_id != id);
        t.cart_items.retain(|_, i| i.product_id != id);
        t.tagged_items.retain(|_, i| !(i.content_type == PRODUCT_CONTENT_TYPE && i.object_id == id));
        Ok(true)
    }

    async fn list_reviews(&self, product_id: i64) -> Result<Vec<Review>> {
        Ok(self.tables.read().reviews.values().filter(|r| r.product_id == product_id).cloned().collect())
    }

    async fn get_review(&self, product_id: i64, id: i64) -> Result<Option<Review>> {
        Ok(self.tables.read().reviews.get(&id).filter(|r| r.product_id == product_id).cloned())
    }

    async fn create_review(&self, product_id: i64, draft: &ReviewDraft) -> Result<Review> {
        let mut t = self.tables.write();
        if !t.products.contains_key(&product_id) { return Err(StoreError::NotFound); }
        let id = t.next_id("reviews");
        let review = Review { id, product_id, date: Utc::now().date_naive(), name: draft.name.clone(), description: draft.description.clone() };
        t.reviews.insert(id, review.clone());
        Ok(review)
    }

    async fn update_review(&self, product_id: i64, id: i64, draft: &ReviewDraft) -> Result<Option<Review>> {
        let mut t = self.tables.write();
        Ok(t.reviews.get_mut(&id).filter(|r| r.product_id == product_id).map(|r| {
            r.name = draft.name.clone();
            r.description = draft.description.clone();
            r.clone()
        }))
    }

    async fn delete_review(&self, product_id: i64, id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        if t.reviews.get(&id).map_or(false, |r| r.product_id == product_id) {
            t.reviews.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn create_cart(&self) -> Result<Cart> {
        let cart = Cart::new();
        self.tables.write().carts.insert(cart.id(), cart.created_at());
        Ok(cart)
    }

    async fn get_cart(&self, id: Uuid) -> Result<Option<Cart>> {
        Ok(self.tables.read().cart(id))
    }

    async fn delete_cart(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables.write();
        if t.carts.remove(&id).is_none() { return Ok(false); }
        t.cart_items.retain(|_, i| i.cart_id != id);
        Ok(true)
    }

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        Ok(self.tables.read().cart_lines(cart_id))
    }

    async fn get_cart_item(&self, cart_id: Uuid, id: i64) -> Result<Option<CartLine>> {
        let t = self.tables.read();
        Ok(t.cart_items.get(&id).filter(|i| i.cart_id == cart_id).and_then(|i| t.cart_line(i)))
    }

    async fn add_cart_item(&self, cart_id: Uuid, product_id: i64, quantity: Quantity) -> Result<CartItem> {
        let mut t = self.tables.write();
        if !t.carts.contains_key(&cart_id) { return Err(StoreError::NotFound); }
        if !t.products.contains_key(&product_id) { return Err(StoreError::field("product_id", messages::NO_PRODUCT)); }
        if let Some(existing) = t.cart_items.values_mut().find(|i| i.cart_id == cart_id && i.product_id == product_id) {
            let merged = Quantity::new(existing.quantity).map_or(Ok(quantity), |q| q.add(quantity));
            existing.quantity = merged.map_err(|e| StoreError::field("quantity", e.to_string()))?.value();
            return Ok(existing.clone());
        }
        let id = t.next_id("cart_items");
        let item = CartItem { id, cart_id, product_id, quantity: quantity.value() };
        t.cart_items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_cart_item(&self, cart_id: Uuid, id: i64, quantity: Quantity) -> Result<Option<CartItem>> {
        let mut t = self.tables.write();
        Ok(t.cart_items.get_mut(&id).filter(|i| i.cart_id == cart_id).map(|i| {
            i.quantity = quantity.value();
            i.clone()
        }))
    }

    async fn delete_cart_item(&self, cart_id: Uuid, id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        if t.cart_items.get(&id).map_or(false, |i| i.cart_id == cart_id) {
            t.cart_items.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut t = self.tables.write();
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::field("username", messages::USERNAME_TAKEN));
        }
        let id = t.next_id("users");
        let user = user.clone().into_user(id);
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.tables.read().users.values().find(|u| u.username == username).cloned())
    }

    async fn create_customer(&self, user_id: i64, draft: &CustomerDraft) -> Result<Customer> {
        let mut t = self.tables.write();
        if !t.users.contains_key(&user_id) { return Err(StoreError::field("user_id", messages::NO_USER)); }
        if t.customers.values().any(|c| c.user_id == user_id) {
            return Err(StoreError::field("user_id", messages::CUSTOMER_EXISTS));
        }
        let id = t.next_id("customers");
        let customer = draft.clone().into_customer(id, user_id);
        t.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        Ok(self.tables.read().customers.get(&id).cloned())
    }

    async fn customer_for_user(&self, user_id: i64) -> Result<Option<Customer>> {
        Ok(self.tables.read().customers.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn update_customer(&self, id: i64, draft: &CustomerDraft) -> Result<Option<Customer>> {
        let mut t = self.tables.write();
        Ok(t.customers.get_mut(&id).map(|c| {
            *c = draft.clone().into_customer(c.id, c.user_id);
            c.clone()
        }))
    }

    async fn list_orders(&self, customer_id: Option<i64>) -> Result<Vec<Order>> {
        let t = self.tables.read();
        Ok(t.orders.values().filter(|o| customer_id.map_or(true, |c| o.customer_id == c)).map(|o| t.order(o)).collect())
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>> {
        let t = self.tables.read();
        Ok(t.orders.get(&id).map(|o| t.order(o)))
    }

    async fn place_order(&self, customer_id: i64, cart_id: Uuid) -> Result<Order> {
        let mut t = self.tables.write();
        let cart = t.cart(cart_id).ok_or_else(|| StoreError::field("cart_id", messages::NO_CART))?;
        let lines = Order::lines_from_cart(&cart).map_err(|e| StoreError::field("cart_id", e.to_string()))?;
        let id = t.next_id("orders");
        let row = OrderRow { id, customer_id, placed_at: Utc::now(), payment_status: PaymentStatus::Pending };
        t.orders.insert(id, row.clone());
        for line in lines {
            let item_id = t.next_id("order_items");
            t.order_items.insert(item_id, OrderItemRow { id: item_id, order_id: id, product_id: line.product.id, quantity: line.quantity, unit_price: line.product.unit_price });
        }
        t.carts.remove(&cart_id);
        t.cart_items.retain(|_, i| i.cart_id != cart_id);
        Ok(t.order(&row))
    }

    async fn update_payment_status(&self, id: i64, status: PaymentStatus) -> Result<Option<Order>> {
        let mut t = self.tables.write();
        let row = match t.orders.get_mut(&id) {
            Some(row) => {
                row.payment_status = status;
                row.clone()
            }
            None => return Ok(None),
        };
        Ok(Some(t.order(&row)))
    }

    async fn delete_order(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        if t.orders.remove(&id).is_none() { return Ok(false); }
        t.order_items.retain(|_, i| i.order_id != id);
        Ok(true)
    }

    async fn search_tags(&self, search: Option<&str>) -> Result<Vec<Tag>> {
        let needle = search.map(str::to_lowercase);
        let t = self.tables.read();
        let mut tags: Vec<Tag> = t.tags.values().filter(|tag| needle.as_deref().map_or(true, |n| tag.label.to_lowercase().contains(n))).cloned().collect();
        tags.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(tags)
    }

    async fn tags_for(&self, content_type: &str, object_id: i64) -> Result<Vec<TaggedItem>> {
        let t = self.tables.read();
        Ok(t.tagged_items.values().filter(|i| i.content_type == content_type && i.object_id == object_id).filter_map(|i| t.tagged(i)).collect())
    }

    async fn tag_object(&self, label: &str, content_type: &str, object_id: i64) -> Result<TaggedItem> {
        let mut t = self.tables.write();
        let found = t.tags.values().find(|tag| tag.label == label).map(|tag| tag.id);
        let tag_id = match found {
            Some(id) => id,
            None => {
                let id = t.next_id("tags");
                t.tags.insert(id, Tag { id, label: label.to_string() });
                id
            }
        };
        let existing = t.tagged_items.values().find(|i| i.tag_id == tag_id && i.content_type == content_type && i.object_id == object_id).cloned();
        let row = match existing {
            Some(row) => row,
            None => {
                let id = t.next_id("tagged_items");
                let row = TaggedRow { id, tag_id, content_type: content_type.to_string(), object_id };
                t.tagged_items.insert(id, row.clone());
                row
            }
        };
        t.tagged(&row).ok_or_else(|| StoreError::Internal(format!("tag {tag_id} vanished")))
    }

    async fn untag(&self, content_type: &str, object_id: i64, tagged_item_id: i64) -> Result<bool> {
        let mut t = self.tables.write();
        let owned = t.tagged_items.get(&tagged_item_id).map_or(false, |i| i.content_type == content_type && i.object_id == object_id);
        if owned { t.tagged_items.remove(&tagged_item_id); }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::UnitPrice;
    use crate::store::OrderTerm;

    async fn seeded() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let collection = store.create_collection("Beverages").await.unwrap();
        for (title, cents) in [("Tea", 500), ("Coffee", 1200), ("Cocoa", 800)] {
            store
                .create_product(&ProductDraft {
                    title: title.into(), slug: title.to_lowercase(), description: None, inventory: 10,
                    unit_price: UnitPrice::new(Decimal::new(cents, 2)).unwrap(), collection_id: collection.id,
                })
                .await
                .unwrap();
        }
        (store, collection.id)
    }

    #[tokio::test]
    async fn test_list_products_orders_filters_and_pages() {
        let (store, collection_id) = seeded().await;
        let query = ProductQuery { ordering: OrderTerm::parse_list("-unit_price"), limit: 2, ..Default::default() };
        let page = store.list_products(&query).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.items.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), vec!["Coffee", "Cocoa"]);

        let query = ProductQuery { collection_id: Some(collection_id), unit_price_lt: Some(Decimal::new(900, 2)), limit: 10, ..Default::default() };
        let page = store.list_products(&query).await.unwrap();
        assert_eq!(page.items.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), vec!["Cocoa", "Tea"]);
    }

    #[tokio::test]
    async fn test_cart_item_merges_same_product() {
        let (store, _) = seeded().await;
        let cart = store.create_cart().await.unwrap();
        let first = store.add_cart_item(cart.id(), 1, Quantity::new(2).unwrap()).await.unwrap();
        let second = store.add_cart_item(cart.id(), 1, Quantity::new(3).unwrap()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(store.get_cart(cart.id()).await.unwrap().unwrap().total_price().to_string(), "25.00");
    }

    #[tokio::test]
    async fn test_place_order_consumes_cart() {
        let (store, _) = seeded().await;
        let cart = store.create_cart().await.unwrap();
        store.add_cart_item(cart.id(), 2, Quantity::new(1).unwrap()).await.unwrap();
        let order = store.place_order(1, cart.id()).await.unwrap();
        assert_eq!(order.items.len(), 1);
        assert!(store.get_cart(cart.id()).await.unwrap().is_none());
        assert!(matches!(store.delete_product(2).await, Err(StoreError::Protected(messages::PRODUCT_PROTECTED))));
        assert!(store.get_product(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_collection_in_use_is_protected() {
        let (store, collection) = seeded().await;
        assert!(matches!(store.delete_collection(collection).await, Err(StoreError::Protected(messages::COLLECTION_PROTECTED))));
        assert!(store.get_collection(collection).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_merged_quantity_overflow_is_rejected() {
        let (store, _) = seeded().await;
        let cart = store.create_cart().await.unwrap();
        store.add_cart_item(cart.id(), 1, Quantity::new(i32::MAX).unwrap()).await.unwrap();
        match store.add_cart_item(cart.id(), 1, Quantity::new(5).unwrap()).await {
            Err(StoreError::Validation(fields)) => assert!(fields.contains_key("quantity")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.list_cart_items(cart.id()).await.unwrap()[0].quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_tagging_is_idempotent() {
        let (store, _) = seeded().await;
        let a = store.tag_object("organic", "product", 1).await.unwrap();
        let b = store.tag_object("organic", "product", 1).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.search_tags(Some("ORG")).await.unwrap().len(), 1);
        assert!(!store.untag("product", 2, a.id).await.unwrap());
        assert!(store.untag("product", 1, a.id).await.unwrap());
    }
}

//! End-to-end HTTP tests against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::{Layer, ServiceExt};
use tower_http::normalize_path::NormalizePathLayer;
use uuid::Uuid;

use storefront::api::accounts::ensure_superuser;
use storefront::auth::{JwtKeys, TokenKind};
use storefront::domain::aggregates::{NewUser, ProductDraft};
use storefront::domain::value_objects::{Quantity, UnitPrice};
use storefront::publisher::EventPublisher;
use storefront::store::{memory::MemoryStore, Store};
use storefront::{router, AppState};

const SECRET: &[u8] = b"integration-secret";

fn keys() -> JwtKeys {
    JwtKeys::new(SECRET, Duration::minutes(5), Duration::days(1))
}

struct TestApp {
    state: AppState,
    store: Arc<MemoryStore>,
    admin: String,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let admin = ensure_superuser(store.as_ref(), "admin", "admin-password").await.unwrap();
        let state = AppState::new(store.clone(), keys(), EventPublisher::default());
        Self { state, store, admin: keys().issue(admin.id, TokenKind::Access).unwrap() }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri).header(header::HOST, "testserver");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("JWT {token}"));
        }
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let app = NormalizePathLayer::trim_trailing_slash().layer(router(self.state.clone()));
        let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    /// Registers a regular user and returns an access token for them.
    async fn user(&self, username: &str) -> String {
        let body = json!({"username": username, "password": "long-enough-pw", "email": format!("{username}@example.com")});
        let (status, _) = self.send(Method::POST, "/auth/users/", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let creds = json!({"username": username, "password": "long-enough-pw"});
        let (status, tokens) = self.send(Method::POST, "/auth/jwt/create/", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        tokens["access"].as_str().unwrap().to_string()
    }

    async fn collection(&self, title: &str) -> i64 {
        self.store.create_collection(title).await.unwrap().id
    }

    async fn product(&self, collection_id: i64, title: &str, cents: i64) -> i64 {
        let draft = ProductDraft {
            title: title.into(),
            slug: title.to_lowercase().replace(' ', "-"),
            description: Some(format!("All about {title}")),
            inventory: 10,
            unit_price: UnitPrice::new(Decimal::new(cents, 2)).unwrap(),
            collection_id,
        };
        self.store.create_product(&draft).await.unwrap().id
    }

    async fn cart_with(&self, product_id: i64, quantity: i32) -> String {
        let (_, cart) = self.send(Method::POST, "/carts/", None, None).await;
        let id = cart["id"].as_str().unwrap().to_string();
        let body = json!({"product_id": product_id, "quantity": quantity});
        let (status, _) = self.send(Method::POST, &format!("/carts/{id}/items/"), None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        id
    }
}

#[tokio::test]
async fn test_ordered_product_cannot_be_deleted() {
    let app = TestApp::new().await;
    let c = app.collection("Kitchen").await;
    let ordered = app.product(c, "Kettle", 2500).await;
    let spare = app.product(c, "Spoon", 150).await;

    let token = app.user("alice").await;
    let cart = app.cart_with(ordered, 1).await;
    let (status, _) = app.send(Method::POST, "/orders/", Some(&token), Some(json!({"cart_id": cart}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::DELETE, &format!("/products/{ordered}/"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Product Can not be deleted!"}));
    assert_eq!(app.get(&format!("/products/{ordered}/"), None).await.0, StatusCode::OK);

    let (status, _) = app.send(Method::DELETE, &format!("/products/{spare}/"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.get(&format!("/products/{spare}/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not found."}));
}

#[tokio::test]
async fn test_collection_with_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let full = app.collection("Garden").await;
    let empty = app.collection("Empty").await;
    app.product(full, "Rake", 1200).await;

    let (status, body) = app.get(&format!("/collections/{full}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products_count"], 1);

    let (status, body) = app.send(Method::DELETE, &format!("/collections/{full}/"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Collection can not be deleted!"}));

    let (status, _) = app.send(Method::DELETE, &format!("/collections/{empty}/"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::DELETE, &format!("/collections/{empty}/"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_writes_need_staff() {
    let app = TestApp::new().await;
    let c = app.collection("Books").await;
    let body = json!({"title": "Dune", "slug": "dune", "inventory": 3, "unit_price": "19.99", "collection": c});

    let (status, err) = app.send(Method::POST, "/products/", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["detail"], "Authentication credentials were not provided.");

    let token = app.user("bob").await;
    let (status, _) = app.send(Method::POST, "/products/", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.send(Method::POST, "/products/", Some(&app.admin), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["unit_price"], "19.99");
    assert_eq!(created["price_with_tax"], "21.99");

    let uri = format!("/products/{}/", created["id"]);
    let price = json!({"unit_price": "25.00"});
    assert_eq!(app.send(Method::PATCH, &uri, Some(&token), Some(price.clone())).await.0, StatusCode::FORBIDDEN);
    let (status, patched) = app.send(Method::PATCH, &uri, Some(&app.admin), Some(price)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["title"], "Dune");
    assert_eq!(patched["inventory"], 3);
    assert_eq!(patched["price_with_tax"], "27.50");

    let uri = format!("/collections/{c}/");
    let (status, renamed) = app.send(Method::PUT, &uri, Some(&app.admin), Some(json!({"title": "Novels"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["title"], "Novels");
    let (status, renamed) = app.send(Method::PATCH, &uri, Some(&app.admin), Some(json!({"title": "Fiction"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed, json!({"id": c, "title": "Fiction", "products_count": 1}));
    assert_eq!(app.send(Method::PATCH, &uri, Some(&token), Some(json!({"title": "Mine"}))).await.0, StatusCode::FORBIDDEN);

    let (status, err) = app.send(Method::POST, "/products/", Some("not-a-token"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["detail"], "Given token not valid for any token type");
    assert_eq!(app.get("/products/", None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_product_validation_errors_are_keyed_by_field() {
    let app = TestApp::new().await;
    let c = app.collection("Toys").await;
    let body = json!({"title": "Kite", "slug": "kite", "inventory": 1, "unit_price": "0.50", "collection": c + 100});
    let (status, err) = app.send(Method::POST, "/products/", Some(&app.admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["unit_price"][0], "Ensure this value is greater than or equal to 1.");

    let body = json!({"title": "Kite", "slug": "kite", "inventory": 1, "unit_price": "5.00", "collection": c + 100});
    let (status, err) = app.send(Method::POST, "/products/", Some(&app.admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.get("collection").is_some());
}

#[tokio::test]
async fn test_product_listing_filters_searches_and_pages() {
    let app = TestApp::new().await;
    let food = app.collection("Food").await;
    let tools = app.collection("Tools").await;
    for i in 1..=11 {
        app.product(food, &format!("Snack {i:02}"), 100 + i * 100).await;
    }
    app.product(tools, "Hammer", 3000).await;

    let (status, page) = app.get("/products/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 12);
    assert_eq!(page["results"].as_array().unwrap().len(), 10);
    assert_eq!(page["previous"], Value::Null);
    assert_eq!(page["next"], "http://testserver/products?page=2");

    let (_, page) = app.get("/products/?page=2", None).await;
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["previous"], "http://testserver/products");
    assert_eq!(app.get("/products/?page=3", None).await.0, StatusCode::NOT_FOUND);

    let (_, page) = app.get(&format!("/products/?collection_id={tools}"), None).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["title"], "Hammer");

    let (_, page) = app.get("/products/?unit_price__gt=10&unit_price__lt=12.50", None).await;
    let titles: Vec<&str> = page["results"].as_array().unwrap().iter().map(|p| p["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Snack 10", "Snack 11"]);

    let (_, page) = app.get("/products/?search=hammer", None).await;
    assert_eq!(page["count"], 1);

    let (_, page) = app.get("/products/?ordering=-unit_price", None).await;
    assert_eq!(page["results"][0]["title"], "Hammer");
    assert_eq!(page["results"][1]["title"], "Snack 11");
}

#[tokio::test]
async fn test_reviews_are_scoped_to_their_product() {
    let app = TestApp::new().await;
    let c = app.collection("Music").await;
    let a = app.product(c, "Guitar", 30000).await;
    let b = app.product(c, "Drum", 20000).await;

    let body = json!({"name": "Sam", "description": "Lovely tone"});
    let (status, review) = app.send(Method::POST, &format!("/products/{a}/reviews/"), None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let rid = review["id"].as_i64().unwrap();

    assert_eq!(app.get(&format!("/products/{a}/reviews/{rid}/"), None).await.0, StatusCode::OK);
    assert_eq!(app.get(&format!("/products/{b}/reviews/{rid}/"), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/products/{a}/reviews/"), None).await.1.as_array().unwrap().len(), 1);
    assert_eq!(app.get(&format!("/products/{b}/reviews/"), None).await.1.as_array().unwrap().len(), 0);

    let (status, patched) = app.send(Method::PATCH, &format!("/products/{a}/reviews/{rid}/"), None, Some(json!({"description": "Still great"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Sam");
    assert_eq!(patched["description"], "Still great");

    let (status, _) = app.send(Method::DELETE, &format!("/products/{b}/reviews/{rid}/"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({"name": "Sam", "description": "Where did it go?"});
    let (status, err) = app.send(Method::POST, "/products/999/reviews/", None, Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err, json!({"detail": "Not found."}));
}

#[tokio::test]
async fn test_cart_items_merge_and_stay_in_their_cart() {
    let app = TestApp::new().await;
    let c = app.collection("Office").await;
    let pen = app.product(c, "Pen", 250).await;

    let (status, cart) = app.send(Method::POST, "/carts/", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["total_price"], "0.00");
    let first = cart["id"].as_str().unwrap().to_string();

    let add = json!({"product_id": pen, "quantity": 2});
    let (_, item) = app.send(Method::POST, &format!("/carts/{first}/items/"), None, Some(add.clone())).await;
    let (status, merged) = app.send(Method::POST, &format!("/carts/{first}/items/"), None, Some(add)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(merged["id"], item["id"]);
    assert_eq!(merged["quantity"], 4);

    let (_, cart) = app.get(&format!("/carts/{first}/"), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["total_price"], "10.00");
    assert_eq!(cart["total_price"], "10.00");

    let second = app.cart_with(pen, 1).await;
    let item_id = item["id"].as_i64().unwrap();
    assert_eq!(app.get(&format!("/carts/{second}/items/{item_id}/"), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/carts/{second}/items/"), None).await.1.as_array().unwrap().len(), 1);

    let (status, body) = app.send(Method::PATCH, &format!("/carts/{first}/items/{item_id}/"), None, Some(json!({"quantity": 7}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"quantity": 7}));

    let (status, _) = app.send(Method::PUT, &format!("/carts/{first}/items/{item_id}/"), None, Some(json!({"quantity": 1}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, err) = app.send(Method::POST, &format!("/carts/{first}/items/"), None, Some(json!({"product_id": 999, "quantity": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["product_id"][0], "No product with the given ID was found.");

    let (status, err) = app.send(Method::POST, &format!("/carts/{first}/items/"), None, Some(json!({"product_id": pen, "quantity": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.get("quantity").is_some());

    assert_eq!(app.send(Method::DELETE, &format!("/carts/{second}/items/{item_id}/"), None, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.send(Method::DELETE, &format!("/carts/{first}/items/{item_id}/"), None, None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::DELETE, &format!("/carts/{first}/"), None, None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&format!("/carts/{first}/"), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/carts/not-a-uuid/", None).await.0, StatusCode::NOT_FOUND);

    let unknown = Uuid::new_v4();
    let (status, items) = app.get(&format!("/carts/{unknown}/items/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items, json!([]));
    let (status, err) = app.send(Method::POST, &format!("/carts/{unknown}/items/"), None, Some(json!({"product_id": pen, "quantity": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err, json!({"detail": "Not found."}));
}

#[tokio::test]
async fn test_merged_quantity_past_integer_range_is_rejected() {
    let app = TestApp::new().await;
    let c = app.collection("Bulk").await;
    let bolt = app.product(c, "Bolt", 100).await;
    let cart = app.cart_with(bolt, i32::MAX).await;

    let (status, err) = app.send(Method::POST, &format!("/carts/{cart}/items/"), None, Some(json!({"product_id": bolt, "quantity": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["quantity"][0], format!("Ensure this value is less than or equal to {}.", i32::MAX));

    let (_, items) = app.get(&format!("/carts/{cart}/items/"), None).await;
    assert_eq!(items[0]["quantity"], i32::MAX);
}

#[tokio::test]
async fn test_customer_me_reads_and_updates_own_profile() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/customers/me/", None).await.0, StatusCode::UNAUTHORIZED);

    let token = app.user("carol").await;
    let (status, me) = app.get("/customers/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["membership"], "B");
    assert_eq!(me["birth_date"], Value::Null);

    let update = json!({"phone": "555-0100", "birth_date": "1990-04-01", "membership": "G"});
    let (status, me) = app.send(Method::PUT, "/customers/me/", Some(&token), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["phone"], "555-0100");
    assert_eq!(me["membership"], "G");

    let id = me["id"].as_i64().unwrap();
    assert_eq!(app.get(&format!("/customers/{id}/"), Some(&token)).await.0, StatusCode::FORBIDDEN);
    let (status, seen) = app.get(&format!("/customers/{id}/"), Some(&app.admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["birth_date"], "1990-04-01");

    let (status, patched) = app.send(Method::PATCH, &format!("/customers/{id}/"), Some(&app.admin), Some(json!({"birth_date": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["birth_date"], Value::Null);
    assert_eq!(patched["membership"], "G");

    let bare = NewUser {
        username: "no-profile".into(), email: String::new(), first_name: String::new(), last_name: String::new(),
        password_hash: String::new(), is_staff: false,
    };
    let user_id = app.store.create_user(&bare).await.unwrap().id;
    let body = json!({"user_id": user_id, "phone": "555-0199", "membership": "S"});
    assert_eq!(app.send(Method::POST, "/customers/", Some(&token), Some(body.clone())).await.0, StatusCode::FORBIDDEN);
    let (status, created) = app.send(Method::POST, "/customers/", Some(&app.admin), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_id"], user_id);
    assert_eq!(created["membership"], "S");
    let (status, err) = app.send(Method::POST, "/customers/", Some(&app.admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.get("user_id").is_some());
}

#[tokio::test]
async fn test_token_flow() {
    let app = TestApp::new().await;
    app.user("dave").await;

    let (status, err) = app.send(Method::POST, "/auth/jwt/create/", None, Some(json!({"username": "dave", "password": "wrong-password"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["detail"], "No active account found with the given credentials");

    let (_, tokens) = app.send(Method::POST, "/auth/jwt/create/", None, Some(json!({"username": "dave", "password": "long-enough-pw"}))).await;
    let refresh = tokens["refresh"].as_str().unwrap();
    let access = tokens["access"].as_str().unwrap();

    let (status, me) = app.get("/auth/users/me/", Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "dave");
    assert!(me.get("password_hash").is_none());

    let (status, renewed) = app.send(Method::POST, "/auth/jwt/refresh/", None, Some(json!({"refresh": refresh}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(renewed["access"].is_string());

    let (status, _) = app.send(Method::POST, "/auth/jwt/refresh/", None, Some(json!({"refresh": access}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/auth/users/me/", Some(refresh)).await.0, StatusCode::UNAUTHORIZED);

    let dup = json!({"username": "dave", "password": "long-enough-pw"});
    let (status, err) = app.send(Method::POST, "/auth/users/", None, Some(dup)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.get("username").is_some());
}

#[tokio::test]
async fn test_orders_consume_the_cart_and_are_private() {
    let app = TestApp::new().await;
    let c = app.collection("Tea").await;
    let sencha = app.product(c, "Sencha", 1250).await;
    let erin = app.user("erin").await;
    let frank = app.user("frank").await;

    let cart = app.cart_with(sencha, 2).await;
    let (status, order) = app.send(Method::POST, "/orders/", Some(&erin), Some(json!({"cart_id": cart}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["payment_status"], "P");
    assert_eq!(order["items"][0]["unit_price"], "12.50");
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(app.get(&format!("/carts/{cart}/"), None).await.0, StatusCode::NOT_FOUND);

    let id = order["id"].as_i64().unwrap();
    assert_eq!(app.get("/orders/", Some(&erin)).await.1.as_array().unwrap().len(), 1);
    assert_eq!(app.get("/orders/", Some(&frank)).await.1.as_array().unwrap().len(), 0);
    assert_eq!(app.get(&format!("/orders/{id}/"), Some(&frank)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/orders/", None).await.0, StatusCode::UNAUTHORIZED);

    let (_, empty) = app.send(Method::POST, "/carts/", None, None).await;
    let (status, err) = app.send(Method::POST, "/orders/", Some(&erin), Some(json!({"cart_id": empty["id"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["cart_id"][0], "The cart is empty.");

    let paid = json!({"payment_status": "C"});
    assert_eq!(app.send(Method::PATCH, &format!("/orders/{id}/"), Some(&erin), Some(paid.clone())).await.0, StatusCode::FORBIDDEN);
    let (status, updated) = app.send(Method::PATCH, &format!("/orders/{id}/"), Some(&app.admin), Some(paid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["payment_status"], "C");

    assert_eq!(app.send(Method::DELETE, &format!("/orders/{id}/"), Some(&app.admin), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/orders/", Some(&erin)).await.1.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_admin_tags_products() {
    let app = TestApp::new().await;
    let c = app.collection("Outdoor").await;
    let tent = app.product(c, "Tent", 15000).await;
    let uri = format!("/admin/products/{tent}/tags/");

    let (status, first) = app.send(Method::POST, &uri, Some(&app.admin), Some(json!({"label": "camping"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, again) = app.send(Method::POST, &uri, Some(&app.admin), Some(json!({"label": "camping"}))).await;
    assert_eq!(first["id"], again["id"]);
    app.send(Method::POST, &uri, Some(&app.admin), Some(json!({"label": "waterproof"}))).await;

    let (_, tags) = app.get(&uri, Some(&app.admin)).await;
    assert_eq!(tags.as_array().unwrap().len(), 2);
    let (_, found) = app.get("/admin/tags/?search=CAMP", Some(&app.admin)).await;
    assert_eq!(found, json!([{"id": first["tag"]["id"], "label": "camping"}]));

    let token = app.user("gina").await;
    assert_eq!(app.get(&uri, Some(&token)).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/admin/products/999/tags/", Some(&app.admin)).await.0, StatusCode::NOT_FOUND);

    let link = first["id"].as_i64().unwrap();
    assert_eq!(app.send(Method::DELETE, &format!("{uri}{link}/"), Some(&app.admin), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::DELETE, &format!("{uri}{link}/"), Some(&app.admin), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_add_user_checks_password_confirmation() {
    let app = TestApp::new().await;
    let form = json!({"username": "hank", "password1": "long-enough-pw", "password2": "different-pw"});
    let (status, err) = app.send(Method::POST, "/admin/users/", Some(&app.admin), Some(form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["password2"][0], "The two password fields didn't match.");

    let form = json!({"username": "hank", "password1": "long-enough-pw", "password2": "long-enough-pw"});
    let (status, user) = app.send(Method::POST, "/admin/users/", Some(&app.admin), Some(form)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "hank");
    let customer = app.store.customer_for_user(user["id"].as_i64().unwrap()).await.unwrap();
    assert!(customer.is_some());

    let pair = json!({"username": "hank", "password": "long-enough-pw"});
    assert_eq!(app.send(Method::POST, "/auth/jwt/create/", None, Some(pair)).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_store_quantity_merge_matches_http_view() {
    let app = TestApp::new().await;
    let c = app.collection("Misc").await;
    let p = app.product(c, "Thing", 100).await;
    let cart = app.store.create_cart().await.unwrap();
    app.store.add_cart_item(cart.id(), p, Quantity::new(3).unwrap()).await.unwrap();
    let (_, body) = app.get(&format!("/carts/{}/", cart.id()), None).await;
    assert_eq!(body["items"][0]["quantity"], 3);
    assert_eq!(body["total_price"], "3.00");
}

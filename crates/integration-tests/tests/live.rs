//! Tests against running servers.
//!
//! Start both apps with a migrated database and a reachable CMS, then:
//!
//! ```bash
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//! ADMIN_BASE_URL=http://localhost:3001 \
//! ADMIN_API_TOKEN=... \
//! cargo test -p threadline-integration-tests --test live -- --ignored
//! ```
//!
//! The catalog needs at least two in-stock variants.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

fn storefront_url(path: &str) -> String {
    let base =
        std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    format!("{base}{path}")
}

fn admin_url(path: &str) -> String {
    let base = std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".into());
    format!("{base}{path}")
}

fn admin_token() -> String {
    std::env::var("ADMIN_API_TOKEN").expect("ADMIN_API_TOKEN must be set")
}

fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("client builds")
}

/// An address nobody has registered yet.
fn fresh_email() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    format!("live-{nanos}@threadline.test")
}

/// Send a credential request, waiting out the per-IP auth limit.
async fn past_auth_limit<F, Fut>(mut send: F) -> Response
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    for _ in 0..20 {
        let response = send().await.expect("auth request");
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return response;
        }
        tokio::time::sleep(Duration::from_secs(6)).await;
    }
    panic!("auth rate limit never cleared");
}

async fn register(client: &Client, email: &str) -> Response {
    let body = json!({ "email": email, "password": "correct horse battery", "name": "Live Test" });
    past_auth_limit(|| {
        client
            .post(storefront_url("/api/auth/register"))
            .json(&body)
            .send()
    })
    .await
}

/// A browser signed in as a new customer.
async fn signed_in() -> Client {
    let client = browser();
    assert_eq!(register(&client, &fresh_email()).await.status(), StatusCode::CREATED);
    client
}

/// The value of cookie `name` among the response's `Set-Cookie` headers.
fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Cart lines for `count` distinct in-stock variants from the live catalog.
async fn buyable_lines(count: usize) -> Vec<Value> {
    let products: Vec<Value> = Client::new()
        .get(storefront_url("/api/catalog/products"))
        .send()
        .await
        .expect("products")
        .json()
        .await
        .expect("json");

    let lines: Vec<Value> = products
        .iter()
        .filter(|product| product["available"] != false)
        .flat_map(|product| {
            product["variants"]
                .as_array()
                .into_iter()
                .flatten()
                .filter(|variant| variant["available"] != false && variant["stock"] != 0)
                .map(|variant| {
                    json!({
                        "productId": product["_id"],
                        "variantId": variant["_key"],
                        "quantity": 1,
                    })
                })
        })
        .take(count)
        .collect();
    assert_eq!(lines.len(), count, "catalog needs {count} buyable variants");
    lines
}

async fn push_cart(client: &Client, lines: &[Value], synced_at: &Value) -> Response {
    client
        .put(storefront_url("/api/cart"))
        .json(&json!({ "lines": lines, "syncedAt": synced_at }))
        .send()
        .await
        .expect("push cart")
}

fn pickup() -> Value {
    json!({
        "method": "pickup",
        "location": "Main St",
        "contactName": "Live Test",
        "phone": "555-0100",
    })
}

async fn place_order(client: &Client, client_total: &Value) -> Response {
    client
        .post(storefront_url("/api/orders"))
        .json(&json!({ "fulfillment": pickup(), "clientTotal": client_total }))
        .send()
        .await
        .expect("place order")
}

/// Fill the cart with one line and return the server's quoted total.
async fn cart_with_quote(client: &Client) -> Value {
    let lines = buyable_lines(1).await;
    assert_eq!(
        push_cart(client, &lines, &Value::Null).await.status(),
        StatusCode::OK
    );

    let response = place_order(client, &json!("0.01")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["details"]["reason"], "total_mismatch");
    body["details"]["quote"]["total"].clone()
}

fn address(city: &str) -> Value {
    json!({
        "recipientName": "Live Test",
        "line1": "1 Main St",
        "city": city,
        "postalCode": "10001",
        "country": "US",
    })
}

async fn create_address(client: &Client, body: &Value) -> Value {
    let response = client
        .post(storefront_url("/api/account/addresses"))
        .json(body)
        .send()
        .await
        .expect("create address");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("json")
}

async fn addresses(client: &Client) -> Vec<Value> {
    client
        .get(storefront_url("/api/account/addresses"))
        .send()
        .await
        .expect("addresses")
        .json()
        .await
        .expect("json")
}

fn primary_count(addresses: &[Value]) -> usize {
    addresses
        .iter()
        .filter(|address| address["isPrimary"] == true)
        .count()
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_servers_are_ready() {
    let client = Client::new();
    for url in [storefront_url("/health/ready"), admin_url("/health/ready")] {
        let response = client.get(&url).send().await.expect("server reachable");
        assert_eq!(response.status(), StatusCode::OK, "{url}");
    }
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_register_sign_in_and_sign_out() {
    let client = browser();
    let email = fresh_email();

    let response = register(&client, &email).await;
    assert!(response.status().is_success(), "{}", response.status());

    let me: Value = client
        .get(storefront_url("/api/auth/me"))
        .send()
        .await
        .expect("me")
        .json()
        .await
        .expect("json");
    assert_eq!(me["user"]["email"], email);

    let cart = client
        .get(storefront_url("/api/cart"))
        .send()
        .await
        .expect("cart");
    assert_eq!(cart.status(), StatusCode::OK);

    let logout = client
        .post(storefront_url("/api/auth/logout"))
        .send()
        .await
        .expect("logout");
    assert!(logout.status().is_success());

    let after = client
        .get(storefront_url("/api/account/profile"))
        .send()
        .await
        .expect("profile");
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_duplicate_registration_conflicts() {
    let email = fresh_email();

    let first = register(&browser(), &email).await;
    assert!(first.status().is_success());

    let second = register(&Client::new(), &email).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_admin_lists_orders() {
    let response = Client::new()
        .get(admin_url("/rpc/order.list"))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("order.list");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("json");
    assert!(body["result"]["data"].is_object() || body["result"]["data"].is_array());
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_admin_catalog_matches_storefront() {
    let admin: Value = Client::new()
        .get(admin_url("/rpc/category.list"))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("category.list")
        .json()
        .await
        .expect("json");
    let storefront: Value = Client::new()
        .get(storefront_url("/api/catalog/categories"))
        .send()
        .await
        .expect("categories")
        .json()
        .await
        .expect("json");

    let count = |value: &Value| value.as_array().map_or(0, Vec::len);
    assert_eq!(count(&admin["result"]["data"]), count(&storefront));
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_refresh_token_reuse_revokes_every_session() {
    let client = Client::new();
    let registered = register(&client, &fresh_email()).await;
    let first = set_cookie(&registered, "refresh_token").expect("refresh cookie");

    let refresh = |token: &str| {
        let client = &client;
        let cookie = format!("refresh_token={token}");
        past_auth_limit(move || {
            client
                .post(storefront_url("/api/auth/refresh"))
                .header(COOKIE, cookie.clone())
                .send()
        })
    };

    let rotated = refresh(&first).await;
    assert_eq!(rotated.status(), StatusCode::OK);
    let second = set_cookie(&rotated, "refresh_token").expect("rotated cookie");
    assert_ne!(first, second);

    let replayed = refresh(&first).await;
    assert_eq!(replayed.status(), StatusCode::UNAUTHORIZED);

    let after_replay = refresh(&second).await;
    assert_eq!(after_replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_primary_address_follows_saves_and_deletes() {
    let client = signed_in().await;

    let home = create_address(&client, &address("Springfield")).await;
    assert_eq!(home["isPrimary"], true, "first address becomes primary");
    let work = create_address(&client, &address("Shelbyville")).await;
    assert_eq!(work["isPrimary"], false);

    let promoted: Value = client
        .post(storefront_url(&format!(
            "/api/account/addresses/{}/primary",
            work["id"]
        )))
        .send()
        .await
        .expect("set primary")
        .json()
        .await
        .expect("json");
    assert_eq!(promoted["isPrimary"], true);

    let listed = addresses(&client).await;
    assert_eq!(primary_count(&listed), 1);
    assert_eq!(listed[0]["id"], work["id"], "primary is listed first");

    let deleted = client
        .delete(storefront_url(&format!(
            "/api/account/addresses/{}",
            work["id"]
        )))
        .send()
        .await
        .expect("delete");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let listed = addresses(&client).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], home["id"]);
    assert_eq!(listed[0]["isPrimary"], true, "remaining address is promoted");
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_concurrent_first_addresses_keep_one_primary() {
    let client = signed_in().await;
    let (first, second) = tokio::join!(
        client
            .post(storefront_url("/api/account/addresses"))
            .json(&address("Springfield"))
            .send(),
        client
            .post(storefront_url("/api/account/addresses"))
            .json(&address("Shelbyville"))
            .send(),
    );
    assert_eq!(first.expect("first").status(), StatusCode::CREATED);
    assert_eq!(second.expect("second").status(), StatusCode::CREATED);

    let listed = addresses(&client).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(primary_count(&listed), 1);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_cart_push_is_repriced_and_stored() {
    let client = signed_in().await;
    let mut lines = buyable_lines(1).await;
    lines[0]["unitPrice"] = json!("0.01");
    lines[0]["name"] = json!("Whatever the client says");

    let response = push_cart(&client, &lines, &Value::Null).await;
    assert_eq!(response.status(), StatusCode::OK);
    let pushed: Value = response.json().await.expect("json");
    assert_eq!(pushed["lines"].as_array().map(Vec::len), Some(1));
    assert_ne!(pushed["lines"][0]["unitPrice"], "0.01");
    assert_ne!(pushed["lines"][0]["name"], "Whatever the client says");
    assert!(pushed["updatedAt"].is_string());

    let stored: Value = client
        .get(storefront_url("/api/cart"))
        .send()
        .await
        .expect("cart")
        .json()
        .await
        .expect("json");
    assert_eq!(stored["lines"], pushed["lines"]);

    let emptied: Value = push_cart(&client, &[], &pushed["updatedAt"])
        .await
        .json()
        .await
        .expect("json");
    assert_eq!(emptied["lines"], json!([]), "lines removed after the last sync are dropped");
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_concurrent_cart_pushes_keep_both_lines() {
    let client = signed_in().await;
    let lines = buyable_lines(2).await;

    let created: Value = push_cart(&client, &[], &Value::Null)
        .await
        .json()
        .await
        .expect("json");
    let synced_at = created["updatedAt"].clone();

    let (phone, laptop) = tokio::join!(
        push_cart(&client, &lines[..1], &synced_at),
        push_cart(&client, &lines[1..], &synced_at),
    );
    assert_eq!(phone.status(), StatusCode::OK);
    assert_eq!(laptop.status(), StatusCode::OK);

    let stored: Value = client
        .get(storefront_url("/api/cart"))
        .send()
        .await
        .expect("cart")
        .json()
        .await
        .expect("json");
    assert_eq!(stored["lines"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_empty_cart_checkout_is_rejected() {
    let client = signed_in().await;
    let response = place_order(&client, &json!("10.00")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_checkout_places_order_for_quoted_total() {
    let client = signed_in().await;
    let total = cart_with_quote(&client).await;

    let response = place_order(&client, &total).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.expect("json");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));

    let cart: Value = client
        .get(storefront_url("/api/cart"))
        .send()
        .await
        .expect("cart")
        .json()
        .await
        .expect("json");
    assert_eq!(cart["lines"], json!([]), "checkout empties the cart");
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_double_submit_places_one_order() {
    let client = signed_in().await;
    let total = cart_with_quote(&client).await;

    let (first, second) = tokio::join!(place_order(&client, &total), place_order(&client, &total));
    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [201, 400], "the second submit finds the cart already ordered");

    let orders: Vec<Value> = client
        .get(storefront_url("/api/orders"))
        .send()
        .await
        .expect("orders")
        .json()
        .await
        .expect("json");
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
#[ignore = "Requires running servers with a database and CMS"]
async fn test_orders_are_visible_only_to_their_owner() {
    let owner = signed_in().await;
    let total = cart_with_quote(&owner).await;
    let order: Value = place_order(&owner, &total)
        .await
        .json()
        .await
        .expect("json");
    let path = format!("/api/orders/{}", order["id"]);

    let mine = owner.get(storefront_url(&path)).send().await.expect("own order");
    assert_eq!(mine.status(), StatusCode::OK);

    let stranger = signed_in().await;
    let theirs = stranger.get(storefront_url(&path)).send().await.expect("other order");
    assert_eq!(theirs.status(), StatusCode::NOT_FOUND);
}

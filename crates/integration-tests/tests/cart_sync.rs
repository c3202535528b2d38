//! Anonymous cart, sign-in merge and quantity limits.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use larkspur_integration_tests::TestApp;
use larkspur_storefront::api::ServerCartItem;
use larkspur_core::VariantId;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "Abcdef1!";

fn app() -> TestApp {
    let app = TestApp::new();
    app.api.add_variant("V1", "P1", "Linen Shirt", 4_500);
    app.api.add_variant("V2", "P2", "Wool Socks", 1_250);
    app
}

#[tokio::test]
async fn test_anonymous_cart_moves_to_server_on_sign_in() {
    let app = app();
    let (_, user_id) = app.add_account(EMAIL, PASSWORD);

    let added = app
        .post_json("/api/cart/items", &json!({ "variant_id": "V1", "quantity": 3 }))
        .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.json()["status"], "added");
    assert_eq!(added.json()["item_count"], 3);
    assert!(app.api.cart_of(&user_id).is_empty());

    app.sign_in(EMAIL, PASSWORD).await;

    assert_eq!(
        app.api.cart_of(&user_id),
        vec![ServerCartItem {
            variant_id: VariantId::new("V1"),
            quantity: 3,
        }]
    );

    // The local copy is gone: signing out shows an empty cart
    let logout = app.post_form("/auth/logout", &[]).await;
    assert_eq!(logout.status, StatusCode::SEE_OTHER);
    let cart = app.get("/api/cart").await.json();
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_sync_runs_once_per_session() {
    let app = app();
    let (_, user_id) = app.add_account(EMAIL, PASSWORD);

    app.post_json("/api/cart/items", &json!({ "variant_id": "V1", "quantity": 2 }))
        .await;
    app.sign_in(EMAIL, PASSWORD).await;

    for _ in 0..3 {
        let cart = app.get("/api/cart").await;
        assert_eq!(cart.json()["item_count"], 2);
    }
    let sync = app.post_json("/api/cart/sync", &json!({})).await;
    assert_eq!(sync.json()["status"], "already_synced");

    assert_eq!(app.api.cart_of(&user_id).len(), 1);
    assert_eq!(app.api.cart_of(&user_id)[0].quantity, 2);
}

#[tokio::test]
async fn test_merge_respects_the_line_limit() {
    let app = app();
    let (_, user_id) = app.add_account(EMAIL, PASSWORD);
    app.api.set_cart(
        &user_id,
        vec![ServerCartItem {
            variant_id: VariantId::new("V1"),
            quantity: 8,
        }],
    );

    app.post_json("/api/cart/items", &json!({ "variant_id": "V1", "quantity": 5 }))
        .await;
    app.sign_in(EMAIL, PASSWORD).await;

    assert_eq!(app.api.cart_of(&user_id)[0].quantity, 10);
}

#[tokio::test]
async fn test_adding_past_the_limit_caps_then_refuses() {
    let app = app();

    let first = app
        .post_json("/api/cart/items", &json!({ "variant_id": "V2", "quantity": 8 }))
        .await;
    assert_eq!(first.json()["status"], "added");

    let capped = app
        .post_json("/api/cart/items", &json!({ "variant_id": "V2", "quantity": 5 }))
        .await;
    assert_eq!(capped.status, StatusCode::OK);
    assert_eq!(capped.json()["status"], "capped");
    assert_eq!(capped.json()["added"], 2);
    assert_eq!(capped.json()["item_count"], 10);

    let refused = app
        .post_json("/api/cart/items", &json!({ "variant_id": "V2" }))
        .await;
    assert_eq!(refused.json()["status"], "at_limit");
    assert_eq!(refused.json()["item_count"], 10);

    let toasts = app.toast_messages().await;
    assert!(toasts.len() >= 3, "toasts: {toasts:?}");
}

#[tokio::test]
async fn test_update_and_remove_local_lines() {
    let app = app();
    app.post_json("/api/cart/items", &json!({ "variant_id": "V1" }))
        .await;
    app.post_json("/api/cart/items", &json!({ "variant_id": "V2", "quantity": 2 }))
        .await;

    let updated = app
        .patch_json("/api/cart/items/V1", &json!({ "quantity": 25 }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["item_count"], 12);

    let removed = app.delete("/api/cart/items/V2").await;
    assert_eq!(removed.json()["item_count"], 10);

    let missing = app.delete("/api/cart/items/V2").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let badge = app.get("/cart/count").await;
    assert_eq!(badge.status, StatusCode::OK);
    assert!(badge.body.contains(">10<"), "badge: {}", badge.body);

    let cleared = app.delete("/api/cart").await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/api/cart").await.json()["item_count"], 0);
}

#[tokio::test]
async fn test_mutations_fire_htmx_events() {
    let app = app();
    let added = app
        .post_json("/api/cart/items", &json!({ "variant_id": "V1" }))
        .await;
    let trigger = added.headers.get("HX-Trigger").unwrap().to_str().unwrap();
    assert!(trigger.contains("cart-updated"));
    assert!(trigger.contains("toasts-updated"));
}

#[tokio::test]
async fn test_failed_lines_stay_local() {
    let app = app();
    let (_, user_id) = app.add_account(EMAIL, PASSWORD);
    app.api.fail_adds_of("V2");

    app.post_json("/api/cart/items", &json!({ "variant_id": "V1" }))
        .await;
    app.post_json("/api/cart/items", &json!({ "variant_id": "V2" }))
        .await;
    app.sign_in(EMAIL, PASSWORD).await;

    let server = app.api.cart_of(&user_id);
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].variant_id, VariantId::new("V1"));

    app.post_form("/auth/logout", &[]).await;
    let cart = app.get("/api/cart").await.json();
    assert_eq!(cart["item_count"], 1);
    assert_eq!(cart["lines"][0]["variant_id"], "V2");
}

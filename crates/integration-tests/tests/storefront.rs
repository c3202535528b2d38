//! Catalog, favorites, checkout, toasts and rate limiting.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, StatusCode};
use serde_json::json;

use larkspur_integration_tests::TestApp;

const EMAIL: &str = "kai@example.com";
const PASSWORD: &str = "Abcdef1!";

fn app() -> TestApp {
    let app = TestApp::new();
    app.api.add_variant("V1", "P1", "Linen Shirt", 4_500);
    app.api.add_variant("V2", "P1", "Linen Shirt", 4_500);
    app.api.add_variant("V3", "P2", "Wool Socks", 1_250);
    app
}

#[tokio::test]
async fn test_product_listing_and_detail() {
    let app = app();

    let listing = app.get("/api/products?sort=price_asc&page=1").await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.json()["products"].as_array().unwrap().len(), 2);

    let detail = app.get("/api/products/P1").await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.json()["variants"].as_array().unwrap().len(), 2);

    let missing = app.get("/api/products/P9").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inverted_price_range_is_rejected() {
    let app = app();
    let response = app.get("/api/products?min_price=50&max_price=10").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reviews_require_sign_in() {
    let app = app();
    app.add_account(EMAIL, PASSWORD);
    let review = json!({ "rating": 5, "body": "Soft and breathable." });

    let anonymous = app.post_json("/api/products/P1/reviews", &review).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    app.sign_in(EMAIL, PASSWORD).await;
    let created = app.post_json("/api/products/P1/reviews", &review).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let out_of_range = app
        .post_json(
            "/api/products/P1/reviews",
            &json!({ "rating": 6, "body": "Too good." }),
        )
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);

    let reviews = app.get("/api/products/P1/reviews").await.json();
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["body"], "Soft and breathable.");
}

#[tokio::test]
async fn test_favorites_toggle() {
    let app = app();
    let (_, user_id) = app.add_account(EMAIL, PASSWORD);

    let anonymous = app
        .post_json("/api/favorites/P1/toggle", &json!({}))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert!(
        app.toast_messages()
            .await
            .iter()
            .any(|m| m == "Sign in to save favorites.")
    );

    app.sign_in(EMAIL, PASSWORD).await;
    let on = app
        .post_json("/api/favorites/P1/toggle", &json!({}))
        .await;
    assert_eq!(on.json()["is_favorite"], true);
    assert_eq!(app.api.favorites_of(&user_id).len(), 1);

    let listed = app.get("/api/favorites").await.json();
    assert_eq!(listed["product_ids"], json!(["P1"]));

    let off = app
        .post_json("/api/favorites/P1/toggle", &json!({}))
        .await;
    assert_eq!(off.json()["is_favorite"], false);
    assert!(app.api.favorites_of(&user_id).is_empty());
}

#[tokio::test]
async fn test_checkout_handoff() {
    let app = app();
    app.add_account(EMAIL, PASSWORD);

    let anonymous = app.post_json("/api/checkout", &json!({})).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    app.sign_in(EMAIL, PASSWORD).await;
    let empty = app.post_json("/api/checkout", &json!({})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    app.post_json("/api/cart/items", &json!({ "variant_id": "V3", "quantity": 2 }))
        .await;
    let started = app.post_json("/api/checkout", &json!({})).await;
    assert_eq!(started.status, StatusCode::OK);
    let body = started.json();
    assert!(body["client_secret"].as_str().unwrap().starts_with("cs_test_"));
    assert_eq!(body["publishable_key"], "pk_test_larkspur");
}

#[tokio::test]
async fn test_toast_fragment_and_dismiss() {
    let app = app();
    app.post_json("/api/cart/items", &json!({ "variant_id": "V1" }))
        .await;

    let fragment = app.get("/toasts").await;
    assert_eq!(fragment.status, StatusCode::OK);
    assert!(fragment.body.contains("toast-success"));

    let toasts = app.get("/api/toasts").await.json();
    let id = toasts[0]["id"].as_u64().unwrap();

    let dismissed = app
        .post_json(&format!("/api/toasts/{id}/dismiss"), &json!({}))
        .await;
    assert_eq!(dismissed.status, StatusCode::NO_CONTENT);

    let again = app
        .post_json(&format!("/api/toasts/{id}/dismiss"), &json!({}))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    assert!(!app.get("/toasts").await.body.contains("toast-success"));
}

#[tokio::test]
async fn test_profile_requires_sign_in() {
    let app = app();
    let response = app.get("/api/account").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures_render_the_form() {
    let app = app();
    app.add_account(EMAIL, PASSWORD);

    let wrong = app
        .post_form("/auth/login", &[("email", EMAIL), ("password", "Wrong1!x")])
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(wrong.body.contains(EMAIL));

    let invalid = app
        .post_form("/auth/login", &[("email", "kai"), ("password", PASSWORD)])
        .await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = app();
    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = app
            .send_from(
                "192.0.2.7",
                Method::GET,
                "/auth/login",
                Body::empty(),
                None,
            )
            .await;
        statuses.push(response.status);
    }
    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}

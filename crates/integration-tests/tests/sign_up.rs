//! Registration, email verification and availability checks.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use larkspur_integration_tests::{TestApp, parse_email};
use larkspur_storefront::testing::FAKE_CODE;

const EMAIL: &str = "lin@example.com";
const PASSWORD: &str = "Abcdef1!";
const PAGE: &str = "/auth/sign-up";

#[tokio::test]
async fn test_sign_up_confirm_and_sign_in() {
    let app = TestApp::new();

    let page = app.get(PAGE).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Create account"));

    let registered = app
        .post_form(PAGE, &[("email", EMAIL), ("password", PASSWORD)])
        .await;
    assert_eq!(registered.status, StatusCode::OK);
    assert!(registered.body.contains("/auth/sign-up/confirm"));
    assert!(!app.identity.is_confirmed(&parse_email(EMAIL)));

    let resent = app.post_form("/auth/sign-up/resend", &[]).await;
    assert_eq!(resent.status, StatusCode::OK);

    let confirmed = app
        .post_form("/auth/sign-up/confirm", &[("code", FAKE_CODE)])
        .await;
    assert_eq!(confirmed.status, StatusCode::SEE_OTHER);
    assert_eq!(confirmed.location(), Some(PAGE));
    assert!(app.identity.is_confirmed(&parse_email(EMAIL)));

    let done = app.get(PAGE).await;
    assert!(done.body.contains("Your account is ready."));

    let profile = app.get("/api/account").await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json()["email"], EMAIL);
}

#[tokio::test]
async fn test_pasted_code_is_cleaned_up() {
    let app = TestApp::new();
    app.post_form(PAGE, &[("email", EMAIL), ("password", PASSWORD)])
        .await;

    let pasted = format!(" {} {}\n", &FAKE_CODE[..3], &FAKE_CODE[3..]);
    let confirmed = app
        .post_form("/auth/sign-up/confirm", &[("code", pasted.as_str())])
        .await;
    assert_eq!(confirmed.status, StatusCode::SEE_OTHER);
    assert!(app.identity.is_confirmed(&parse_email(EMAIL)));
}

#[tokio::test]
async fn test_existing_account_is_a_conflict() {
    let app = TestApp::new();
    app.add_account(EMAIL, PASSWORD);

    let response = app
        .post_form(PAGE, &[("email", EMAIL), ("password", PASSWORD)])
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body.contains("role=\"alert\""));
}

#[tokio::test]
async fn test_weak_password_shows_each_requirement() {
    let app = TestApp::new();

    let response = app
        .post_form(PAGE, &[("email", EMAIL), ("password", "abcdefgh")])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("password-checks"));
    assert!(response.body.contains(EMAIL));
    assert!(!app.identity.is_confirmed(&parse_email(EMAIL)));
}

#[tokio::test]
async fn test_confirm_without_sign_up_is_a_conflict() {
    let app = TestApp::new();
    let response = app
        .post_form("/auth/sign-up/confirm", &[("code", FAKE_CODE)])
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_email_availability() {
    let app = TestApp::new();
    app.add_account(EMAIL, PASSWORD);

    let taken = app
        .get("/api/auth/email-available?email=lin%40example.com")
        .await;
    assert_eq!(taken.status, StatusCode::OK);
    assert_eq!(taken.json()["available"], false);

    let free = app
        .get("/api/auth/email-available?email=new%40example.com")
        .await;
    assert_eq!(free.json()["available"], true);

    let invalid = app.get("/api/auth/email-available?email=nope").await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

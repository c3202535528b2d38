//! Router-level integration tests for the Larkspur storefront.
//!
//! [`TestApp`] wires the real router to in-memory fakes of the store API
//! and identity provider with an in-memory session store, and drives it
//! with `tower::ServiceExt::oneshot`. It carries the session cookie between
//! requests the way a browser would.
//!
//! ```bash
//! cargo test -p larkspur-integration-tests
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use larkspur_core::{Email, UserId};
use larkspur_storefront::middleware::session_layer;
use larkspur_storefront::routes;
use larkspur_storefront::state::AppState;
use larkspur_storefront::testing::{FakeIdentity, FakeStoreApi, test_config};

/// A response with its body read into memory.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }

    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// The storefront router over fakes, plus one browser's cookie jar.
pub struct TestApp {
    router: Router,
    pub api: Arc<FakeStoreApi>,
    pub identity: Arc<FakeIdentity>,
    cookie: Mutex<Option<String>>,
    next_ip: AtomicU32,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build the app with an empty catalog and no accounts.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let config = test_config();
        let api = Arc::new(FakeStoreApi::new());
        let identity = Arc::new(FakeIdentity::new());
        let state = AppState::with_services(config.clone(), api.clone(), identity.clone());

        let sessions =
            session_layer(MemoryStore::default(), &config).expect("test config signs sessions");
        let router = routes::routes()
            .layer(sessions)
            .with_state(state);

        Self {
            router,
            api,
            identity,
            cookie: Mutex::new(None),
            next_ip: AtomicU32::new(1),
        }
    }

    /// Register an account with both upstreams and return its id.
    pub fn add_account(&self, email: &str, password: &str) -> (Email, UserId) {
        let email = parse_email(email);
        self.api.add_user(&email);
        let id = self.identity.add_user(&email, password);
        (email, id)
    }

    /// Forget the session cookie, as a new browser would.
    pub fn clear_cookies(&self) {
        *self
            .cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Send a request from a fresh client address.
    ///
    /// Each call gets its own `X-Forwarded-For` so the rate limiters never
    /// trip unless a test asks for it with [`Self::send_from`].
    pub async fn send(&self, method: Method, path: &str, body: Body, content_type: Option<&str>) -> TestResponse {
        let n = self.next_ip.fetch_add(1, Ordering::Relaxed);
        let ip = format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff);
        self.send_from(&ip, method, path, body, content_type).await
    }

    /// Send a request claiming to come from `ip`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    #[allow(clippy::expect_used)]
    pub async fn send_from(
        &self,
        ip: &str,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", ip);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let cookie = self
            .cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(body).expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
            *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, Body::empty(), None).await
    }

    /// POST an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Method::POST,
            path,
            Body::from(body),
            Some("application/x-www-form-urlencoded"),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, json: &Value) -> TestResponse {
        self.json(Method::POST, path, json).await
    }

    pub async fn patch_json(&self, path: &str, json: &Value) -> TestResponse {
        self.json(Method::PATCH, path, json).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, Body::empty(), None).await
    }

    async fn json(&self, method: Method, path: &str, json: &Value) -> TestResponse {
        self.send(
            method,
            path,
            Body::from(json.to_string()),
            Some("application/json"),
        )
        .await
    }

    /// Sign in through the login form.
    ///
    /// # Panics
    ///
    /// Panics unless the login redirects.
    pub async fn sign_in(&self, email: &str, password: &str) {
        let response = self
            .post_form("/auth/login", &[("email", email), ("password", password)])
            .await;
        assert_eq!(
            response.status,
            StatusCode::SEE_OTHER,
            "login failed: {}",
            response.body
        );
    }

    /// Messages of every toast in this browser's stack.
    pub async fn toast_messages(&self) -> Vec<String> {
        self.get("/api/toasts")
            .await
            .json()
            .as_array()
            .map(|toasts| {
                toasts
                    .iter()
                    .filter_map(|t| t["message"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse a known-good email.
///
/// # Panics
///
/// Panics if `raw` is not a valid email.
#[must_use]
#[allow(clippy::expect_used)]
pub fn parse_email(raw: &str) -> Email {
    Email::parse(raw).expect("valid test email")
}

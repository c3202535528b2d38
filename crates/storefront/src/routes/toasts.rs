//! Toast stack endpoints.
//!
//! The HTML fragment is re-fetched by the page whenever a response fires
//! `toasts-updated`. Timed toasts expire on the server, so the fragment only
//! ever shows what is still visible.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::Path,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse},
};
use tracing::instrument;

use crate::middleware::Visitor;
use crate::services::toast::{Toast, ToastId};

/// Toast stack fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/toasts.html")]
pub struct ToastsTemplate {
    pub toasts: Vec<Toast>,
}

/// `GET /toasts` - visible toasts as an HTML fragment.
#[instrument(skip_all)]
pub async fn fragment(visitor: Visitor) -> impl IntoResponse {
    ToastsTemplate {
        toasts: visitor.toasts.visible(),
    }
}

/// `GET /api/toasts` - every toast still in the stack, including ones
/// fading out.
#[instrument(skip_all)]
pub async fn list(visitor: Visitor) -> Json<Vec<Toast>> {
    Json(visitor.toasts.snapshot())
}

/// `POST /api/toasts/{id}/dismiss`
///
/// Answers 404 when the toast already expired.
#[instrument(skip(visitor))]
pub async fn dismiss(visitor: Visitor, Path(id): Path<ToastId>) -> impl IntoResponse {
    if visitor.toasts.dismiss(id) {
        (
            StatusCode::NO_CONTENT,
            AppendHeaders([("HX-Trigger", "toasts-updated")]),
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

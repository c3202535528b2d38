//! Checkout handoff to the embedded payment widget.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::Visitor;
use crate::state::AppState;

/// What the payment widget needs to mount.
#[derive(Serialize)]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub publishable_key: String,
}

/// `POST /api/checkout` - start a payment session for the server cart.
///
/// The API answers 400 for an empty cart.
#[instrument(skip_all)]
pub async fn start(State(state): State<AppState>, visitor: Visitor) -> Result<Json<CheckoutResponse>> {
    let auth = visitor.require_auth()?;
    let session = state.api().create_checkout_session(auth).await?;
    add_breadcrumb("checkout", "Payment session created", None);

    Ok(Json(CheckoutResponse {
        client_secret: session.client_secret,
        publishable_key: state.config().payments.publishable_key.clone(),
    }))
}

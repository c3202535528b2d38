//! Password reset stepper.
//!
//! One page renders whichever step the session is on. Each form posts to
//! its own endpoint, which moves the flow and renders the page again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use larkspur_core::{PasswordChecks, VerificationCode};

use crate::error::{AppError, Result};
use crate::middleware::Visitor;
use crate::services::password_reset::{PasswordResetFlow, ResetError, ResetStep};
use crate::state::AppState;

const PAGE: &str = "/auth/password-reset";

/// Password reset page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/password_reset.html")]
pub struct PasswordResetTemplate {
    /// [`ResetStep::as_str`] of the step being shown.
    pub step: &'static str,
    pub email: String,
    pub destination: Option<String>,
    pub error: Option<String>,
    /// Individual password requirements, after a rejected password.
    pub checks: Option<PasswordChecks>,
}

impl PasswordResetTemplate {
    fn for_step(step: &ResetStep) -> Self {
        let destination = match step {
            ResetStep::ResetPassword { destination, .. } => destination.clone(),
            _ => None,
        };
        Self {
            step: step.as_str(),
            email: step.username().map(ToString::to_string).unwrap_or_default(),
            destination,
            error: None,
            checks: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestCodeForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    pub code: String,
    pub password: String,
}

fn flow<'a>(state: &'a AppState, visitor: &'a Visitor) -> PasswordResetFlow<'a> {
    PasswordResetFlow::new(state.api(), state.identity(), &visitor.session)
}

/// Render the current step with an error, or hand server-side failures to
/// [`AppError`].
async fn rejected(
    flow: &PasswordResetFlow<'_>,
    err: ResetError,
    entered_email: Option<&str>,
) -> Result<Response> {
    let message = err.user_message();
    let checks = match &err {
        ResetError::WeakPassword(e) => Some(e.0),
        _ => None,
    };

    let err = AppError::from(err);
    let status = err.status();
    if status.is_server_error() {
        return Err(err);
    }

    let mut page = PasswordResetTemplate::for_step(&flow.step().await?);
    if let Some(email) = entered_email {
        page.email = email.to_string();
    }
    page.error = Some(message);
    page.checks = checks;
    Ok((status, page).into_response())
}

/// `GET /auth/password-reset`
///
/// A completed flow is shown once and then cleared.
#[instrument(skip_all)]
pub async fn page(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    let flow = flow(&state, &visitor);
    let step = flow.step().await?;
    flow.acknowledge_completion().await?;
    Ok(PasswordResetTemplate::for_step(&step).into_response())
}

/// `POST /auth/password-reset/request` - send (or resend) the code.
#[instrument(skip_all)]
pub async fn request_code(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<RequestCodeForm>,
) -> Result<Response> {
    let flow = flow(&state, &visitor);
    match flow.request_code(&form.email).await {
        Ok(step) => {
            visitor.toasts.info("We sent a code to your email.");
            Ok(PasswordResetTemplate::for_step(&step).into_response())
        }
        Err(e) => rejected(&flow, e, Some(&form.email)).await,
    }
}

/// `POST /auth/password-reset/confirm` - set the new password.
#[instrument(skip_all)]
pub async fn confirm(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Form(form): Form<ConfirmForm>,
) -> Result<Response> {
    let code = VerificationCode::sanitize_input(&form.code);
    let outcome = flow(&state, &visitor).confirm(&code, &form.password).await;

    match outcome {
        Ok(signed_in) => {
            visitor.toasts.success("Your password has been changed.");
            if signed_in.is_some() {
                visitor.signed_in(&state).await?;
            }
            Ok(Redirect::to(PAGE).into_response())
        }
        Err(e) => rejected(&flow(&state, &visitor), e, None).await,
    }
}

/// `POST /auth/password-reset/restart`
#[instrument(skip_all)]
pub async fn restart(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    flow(&state, &visitor).restart().await?;
    Ok(Redirect::to(PAGE).into_response())
}

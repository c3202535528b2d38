//! Sign-up stepper.

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
use crate::services::sign_up::{SignUpError, SignUpFlow, SignUpStep};
use crate::state::AppState;

const PAGE: &str = "/auth/sign-up";

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/sign_up.html")]
pub struct SignUpTemplate {
    /// [`SignUpStep::as_str`] of the step being shown.
    pub step: &'static str,
    pub email: String,
    pub destination: Option<String>,
    pub error: Option<String>,
    pub checks: Option<PasswordChecks>,
}

impl SignUpTemplate {
    fn for_step(step: &SignUpStep) -> Self {
        let (email, destination) = match step {
            SignUpStep::ConfirmEmail {
                username,
                destination,
            } => (username.to_string(), destination.clone()),
            _ => (String::new(), None),
        };
        Self {
            step: step.as_str(),
            email,
            destination,
            error: None,
            checks: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    pub code: String,
}

fn flow<'a>(state: &'a AppState, visitor: &'a Visitor) -> SignUpFlow<'a> {
    SignUpFlow::new(state.identity(), &visitor.session, state.pending_sign_ups())
}

async fn rejected(
    flow: &SignUpFlow<'_>,
    err: SignUpError,
    entered: Option<&SignUpForm>,
) -> Result<Response> {
    let message = err.user_message();
    let checks = match &err {
        SignUpError::WeakPassword(e) => Some(e.0),
        _ => None,
    };

    let err = AppError::from(err);
    let status = err.status();
    if status.is_server_error() {
        return Err(err);
    }

    let mut page = SignUpTemplate::for_step(&flow.step().await?);
    if let Some(form) = entered {
        page.email.clone_from(&form.email);
    }
    page.error = Some(message);
    page.checks = checks;
    Ok((status, page).into_response())
}

/// `GET /auth/sign-up`
#[instrument(skip_all)]
pub async fn page(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    let flow = flow(&state, &visitor);
    let step = flow.step().await?;
    flow.acknowledge_completion().await?;
    Ok(SignUpTemplate::for_step(&step).into_response())
}

/// `POST /auth/sign-up`
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<SignUpForm>,
) -> Result<Response> {
    let flow = flow(&state, &visitor);
    match flow.sign_up(&form.email, &form.password).await {
        Ok(step) => Ok(SignUpTemplate::for_step(&step).into_response()),
        Err(e) => rejected(&flow, e, Some(&form)).await,
    }
}

/// `POST /auth/sign-up/confirm`
#[instrument(skip_all)]
pub async fn confirm(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Form(form): Form<ConfirmForm>,
) -> Result<Response> {
    let code = VerificationCode::sanitize_input(&form.code);
    let outcome = flow(&state, &visitor).confirm(&code).await;

    match outcome {
        Ok(signed_in) => {
            visitor.toasts.success("Your email address is confirmed.");
            if signed_in.is_some() {
                visitor.signed_in(&state).await?;
            } else {
                visitor.toasts.info("Please sign in to continue.");
            }
            Ok(Redirect::to(PAGE).into_response())
        }
        Err(e) => rejected(&flow(&state, &visitor), e, None).await,
    }
}

/// `POST /auth/sign-up/resend`
#[instrument(skip_all)]
pub async fn resend(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    let flow = flow(&state, &visitor);
    match flow.resend_code().await {
        Ok(delivery) => {
            let to = delivery.destination.as_deref().unwrap_or("your email");
            visitor.toasts.info(format!("We sent a new code to {to}."));
            Ok(SignUpTemplate::for_step(&flow.step().await?).into_response())
        }
        Err(e) => rejected(&flow, e, None).await,
    }
}

/// `POST /auth/sign-up/restart`
#[instrument(skip_all)]
pub async fn restart(State(state): State<AppState>, visitor: Visitor) -> Result<Redirect> {
    flow(&state, &visitor).restart().await?;
    Ok(Redirect::to(PAGE))
}

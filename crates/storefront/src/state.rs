//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::api::{ApiError, StoreApi, StoreApiClient};
use crate::config::StorefrontConfig;
use crate::identity::{CognitoClient, IdentityError, IdentityProvider};
use crate::services::debounce::Debouncer;
use crate::services::session::{ATTRIBUTE_DEBOUNCE, AttributeWriter};
use crate::services::sign_up::PendingSignUps;
use crate::services::toast::ToastHub;

/// Debounce window for "is this email taken?" checks.
pub const EMAIL_CHECK_DEBOUNCE: Duration = Duration::from_millis(350);

/// Error building the upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("store API client: {0}")]
    Api(#[from] ApiError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// upstream clients, configuration and the in-memory per-session stores.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: Arc<dyn StoreApi>,
    identity: Arc<dyn IdentityProvider>,
    toasts: ToastHub,
    attributes: AttributeWriter,
    email_checks: Debouncer<Uuid>,
    pending_sign_ups: PendingSignUps,
}

impl AppState {
    /// Create the application state with the real upstream clients.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let api = StoreApiClient::new(&config.api)?;
        let identity = CognitoClient::new(&config.identity)?;
        Ok(Self::with_services(config, Arc::new(api), Arc::new(identity)))
    }

    /// Create the application state around the given upstreams.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        api: Arc<dyn StoreApi>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let toasts = ToastHub::new(config.toast_timeout);
        let attributes = AttributeWriter::new(Arc::clone(&identity), ATTRIBUTE_DEBOUNCE);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                identity,
                toasts,
                attributes,
                email_checks: Debouncer::new(EMAIL_CHECK_DEBOUNCE),
                pending_sign_ups: PendingSignUps::default(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The store REST API.
    #[must_use]
    pub fn api(&self) -> &dyn StoreApi {
        self.inner.api.as_ref()
    }

    /// The identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Per-session toast stacks.
    #[must_use]
    pub fn toasts(&self) -> &ToastHub {
        &self.inner.toasts
    }

    /// Debounced profile attribute writer.
    #[must_use]
    pub fn attributes(&self) -> &AttributeWriter {
        &self.inner.attributes
    }

    /// Debouncer for email availability checks, keyed by session channel.
    #[must_use]
    pub fn email_checks(&self) -> &Debouncer<Uuid> {
        &self.inner.email_checks
    }

    /// Passwords awaiting sign-up confirmation.
    #[must_use]
    pub fn pending_sign_ups(&self) -> &PendingSignUps {
        &self.inner.pending_sign_ups
    }
}

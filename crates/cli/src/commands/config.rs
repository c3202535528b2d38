//! Configuration checks.

use larkspur_storefront::config::{ConfigError, StorefrontConfig};

/// Load the storefront configuration and report where it would listen.
///
/// Runs the same validation as server startup, including the session
/// secret placeholder and entropy checks.
///
/// # Errors
///
/// Returns the first configuration problem found.
pub fn check() -> Result<(), ConfigError> {
    let config = StorefrontConfig::from_env()?;

    tracing::info!(
        addr = %config.socket_addr(),
        base_url = %config.base_url,
        api = %config.api.base_url,
        identity = %config.identity.endpoint,
        sentry = config.sentry_dsn.is_some(),
        "Configuration OK"
    );
    Ok(())
}

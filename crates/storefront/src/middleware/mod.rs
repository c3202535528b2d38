//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `CatchPanicLayer` (fallback page on handler panics)
//! 3. `TraceLayer` (request tracing)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting (governor) on the auth and JSON API routes
//!
//! Handlers take a [`Visitor`] for the session, its toasts and store API
//! credentials.

pub mod auth;
pub mod rate_limit;
pub mod session;
pub mod visitor;

pub use auth::{AuthRejection, OptionalAuth, RequireAuth};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use session::{create_session_layer, session_layer};
pub use visitor::Visitor;

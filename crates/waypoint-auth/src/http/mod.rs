//! HTTP surface of the identity bridge.
//!
//! Builds the axum router for the auth endpoints. The server binds it with
//! `into_make_service_with_connect_info::<SocketAddr>()` so handlers can
//! fall back to the peer address when no `X-Forwarded-For` is present.
//!
//! # Example
//!
//! ```ignore
//! let app = http::router(resolver);
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<SocketAddr>(),
//! )
//! .await?;
//! ```

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::resolver::IdentityResolver;

pub mod error;
pub mod handlers;

pub use error::ErrorBody;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
}

/// Builds the bridge router.
pub fn router(resolver: Arc<IdentityResolver>) -> Router {
    let state = AppState { resolver };

    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/anonymous", post(handlers::anonymous))
        .route("/auth/link", post(handlers::link))
        .route("/auth/verify", post(handlers::verify))
        .route("/auth/check", post(handlers::check))
        .route("/auth/claims", post(handlers::set_claims))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

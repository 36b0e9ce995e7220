//! Federated identity bridge for the Waypoint map service.
//!
//! Accepts credentials minted by external identity providers, validates
//! them, resolves them to a stable internal identity, and issues signed
//! session tokens the rest of the platform trusts. Anonymous identities
//! can be created up front and later made permanent by linking a provider
//! credential onto them without changing their uid.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use waypoint_auth::clock::SystemClock;
//! use waypoint_auth::config::BridgeConfig;
//! use waypoint_auth::resolver::IdentityResolver;
//! use waypoint_auth::store::MemoryIdentityStore;
//!
//! let config: BridgeConfig = toml::from_str(&std::fs::read_to_string("waypoint.toml")?)?;
//! config.validate()?;
//!
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(MemoryIdentityStore::with_clock(clock.clone()));
//! let resolver = Arc::new(IdentityResolver::from_config(&config, store, clock)?);
//!
//! let app = waypoint_auth::http::router(resolver);
//! ```

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod token;

pub use error::AuthError;

/// Result alias used throughout the bridge.
pub type AuthResult<T> = Result<T, AuthError>;

/// Commonly used types.
pub mod prelude {
    pub use crate::admission::{AdmissionController, AdmissionDecision, Endpoint};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::BridgeConfig;
    pub use crate::error::AuthError;
    pub use crate::provider::{Provider, ProviderClient, ProviderCredential};
    pub use crate::resolver::{IdentityResolver, LoginResponse};
    pub use crate::store::{IdentityStore, InternalIdentity, MemoryIdentityStore};
    pub use crate::token::{SessionClaims, SessionVerifier, TokenSigner};
    pub use crate::AuthResult;
}

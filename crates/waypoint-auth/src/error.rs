//! Error types for the identity bridge.
//!
//! This module defines the complete error taxonomy for login, linking and
//! verification operations. Every variant maps to a stable wire code via
//! [`AuthError::code`]; callers use [`AuthError::is_retryable`] to decide
//! whether a retry with backoff makes sense.

use std::time::Duration;

/// Errors that can occur during identity bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider-issued credential is invalid (bad signature, wrong
    /// issuer/audience, rejected by the provider, wrong credential kind).
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Description of why the credential is invalid.
        message: String,
    },

    /// The upstream identity provider is unavailable or misbehaving.
    /// Callers may retry with backoff; the bridge never retries internally.
    #[error("Transient provider error ({provider}): {message}")]
    TransientProviderError {
        /// The provider that failed.
        provider: String,
        /// Description of the upstream failure.
        message: String,
    },

    /// The external identity is already owned by a different internal
    /// identity. Terminal; not retryable without different input.
    #[error("Identity conflict: {message}")]
    IdentityConflict {
        /// Description of the conflicting ownership.
        message: String,
    },

    /// A precondition was violated, e.g. linking a non-anonymous identity.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the violated precondition.
        message: String,
    },

    /// The session token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The session token could not be parsed.
    #[error("Token malformed")]
    TokenMalformed,

    /// The session token signature does not verify against any known key.
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// The token is valid but lacks a required claim.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the missing capability.
        message: String,
    },

    /// The caller exceeded the request budget for this endpoint.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Remaining time in the current rate window.
        retry_after: Duration,
    },

    /// The request named a provider the bridge is not configured for.
    #[error("Provider not configured: {provider}")]
    ProviderNotConfigured {
        /// The provider name from the request.
        provider: String,
    },

    /// An error occurred while reading or writing identity state.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidCredential` error.
    #[must_use]
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates a new `TransientProviderError`.
    #[must_use]
    pub fn transient_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `IdentityConflict` error.
    #[must_use]
    pub fn identity_conflict(message: impl Into<String>) -> Self {
        Self::IdentityConflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidState` error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `RateLimited` error with the remaining window time.
    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates a new `ProviderNotConfigured` error.
    #[must_use]
    pub fn provider_not_configured(provider: impl Into<String>) -> Self {
        Self::ProviderNotConfigured {
            provider: provider.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the stable wire code for this error.
    ///
    /// Codes never change meaning across versions; clients branch on them.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential { .. } | Self::ProviderNotConfigured { .. } => {
                "invalid_credential"
            }
            Self::TransientProviderError { .. } => "transient_provider_error",
            Self::IdentityConflict { .. } => "identity_conflict",
            Self::InvalidState { .. } => "invalid_state",
            Self::TokenExpired => "token_expired",
            Self::TokenMalformed => "token_malformed",
            Self::SignatureInvalid => "signature_invalid",
            Self::Forbidden { .. } => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "internal_error"
            }
        }
    }

    /// Returns `true` if this is a caller-side error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential { .. }
                | Self::IdentityConflict { .. }
                | Self::InvalidState { .. }
                | Self::TokenExpired
                | Self::TokenMalformed
                | Self::SignatureInvalid
                | Self::Forbidden { .. }
                | Self::RateLimited { .. }
                | Self::ProviderNotConfigured { .. }
        )
    }

    /// Returns `true` if this is a server-side error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::TransientProviderError { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the caller may retry this request.
    ///
    /// Transient upstream failures warrant retry with backoff; rate limited
    /// requests may be retried after [`AuthError::retry_after`].
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientProviderError { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns the retry hint for rate limited requests.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns `true` if this is a session token verification failure.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired | Self::TokenMalformed | Self::SignatureInvalid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_credential("signature mismatch");
        assert_eq!(err.to_string(), "Invalid credential: signature mismatch");

        let err = AuthError::transient_provider("kakao", "connect timeout");
        assert_eq!(
            err.to_string(),
            "Transient provider error (kakao): connect timeout"
        );

        let err = AuthError::TokenExpired;
        assert_eq!(err.to_string(), "Token expired");
    }

    #[test]
    fn test_stable_codes() {
        assert_eq!(
            AuthError::invalid_credential("x").code(),
            "invalid_credential"
        );
        assert_eq!(
            AuthError::provider_not_configured("line").code(),
            "invalid_credential"
        );
        assert_eq!(
            AuthError::transient_provider("kakao", "503").code(),
            "transient_provider_error"
        );
        assert_eq!(AuthError::identity_conflict("x").code(), "identity_conflict");
        assert_eq!(AuthError::invalid_state("x").code(), "invalid_state");
        assert_eq!(AuthError::TokenExpired.code(), "token_expired");
        assert_eq!(AuthError::TokenMalformed.code(), "token_malformed");
        assert_eq!(AuthError::SignatureInvalid.code(), "signature_invalid");
        assert_eq!(AuthError::forbidden("x").code(), "forbidden");
        assert_eq!(
            AuthError::rate_limited(Duration::from_secs(30)).code(),
            "rate_limited"
        );
        assert_eq!(AuthError::storage("x").code(), "internal_error");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::invalid_credential("bad");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(!err.is_retryable());

        let err = AuthError::transient_provider("kakao", "503");
        assert!(err.is_server_error());
        assert!(err.is_retryable());

        let err = AuthError::rate_limited(Duration::from_secs(12));
        assert!(err.is_client_error());
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));

        assert!(AuthError::TokenExpired.is_token_error());
        assert!(!AuthError::identity_conflict("x").is_token_error());
        assert_eq!(AuthError::TokenExpired.retry_after(), None);
    }
}

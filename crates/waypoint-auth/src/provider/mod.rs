//! External identity providers.
//!
//! Each supported provider gets one [`ProviderClient`] implementation,
//! selected by the [`Provider`] enum tag. All implementations share the same
//! capability contract: validate a provider-issued credential and return a
//! normalized [`ExternalProfile`].
//!
//! # Example
//!
//! ```ignore
//! use waypoint_auth::provider::{Provider, ProviderCredential};
//!
//! let provider = Provider::Kakao;
//! let credential = ProviderCredential::AccessToken {
//!     access_token: "opaque-token".to_string(),
//! };
//! let profile = clients[&provider].validate(&credential).await?;
//! assert_eq!(profile.provider, Provider::Kakao);
//! ```

pub mod apple;
pub mod google;
pub mod id_token;
pub mod kakao;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::config::ProvidersConfig;
use crate::error::AuthError;

pub use apple::AppleClient;
pub use google::GoogleClient;
pub use id_token::SignedTokenValidator;
pub use kakao::KakaoClient;

/// The external identity providers the bridge understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google sign-in; issues a signed OIDC ID token.
    Google,
    /// Apple sign-in; issues a signed ID token plus an authorization code.
    Apple,
    /// Kakao login; issues an opaque access token validated by introspection.
    Kakao,
}

impl Provider {
    /// Returns the provider name as used in uids and wire payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Kakao => "kakao",
        }
    }

    /// Derives the internal uid owned by `(self, provider_user_id)`.
    ///
    /// The derivation is deterministic: the same pair always yields the
    /// same uid, and no two distinct pairs collide.
    #[must_use]
    pub fn derived_uid(&self, provider_user_id: &str) -> String {
        format!("{}_{}", self.as_str(), provider_user_id)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            "kakao" => Ok(Self::Kakao),
            other => Err(AuthError::provider_not_configured(other)),
        }
    }
}

/// A provider-issued credential presented at login or link time.
///
/// The variant must match what the named provider issues; a mismatch is an
/// `InvalidCredential` error, not a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderCredential {
    /// A signed OIDC ID token (Google-style).
    IdToken {
        /// The compact-serialized JWT.
        id_token: String,
    },
    /// A signed ID token accompanied by an authorization code (Apple-style).
    IdTokenWithCode {
        /// The compact-serialized JWT.
        id_token: String,
        /// The single-use authorization code from the same sign-in.
        authorization_code: String,
    },
    /// An opaque access token validated via introspection (Kakao-style).
    AccessToken {
        /// The opaque token string.
        access_token: String,
    },
}

/// A normalized profile returned by a provider after validation.
///
/// Transient: produced per call and never persisted verbatim. The store
/// copies selected fields as creation-time hints only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    /// The provider that vouched for this profile.
    pub provider: Provider,

    /// The provider-scoped user identifier (`sub` or equivalent).
    pub provider_user_id: String,

    /// Display name, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Profile photo URL, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Email address, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the provider asserts the email is verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl ExternalProfile {
    /// Creates a profile with the required fields.
    #[must_use]
    pub fn new(provider: Provider, provider_user_id: impl Into<String>) -> Self {
        Self {
            provider,
            provider_user_id: provider_user_id.into(),
            display_name: None,
            photo_url: None,
            email: None,
            email_verified: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the photo URL.
    #[must_use]
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the email verification flag.
    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }
}

/// Validates provider-issued credentials.
///
/// One implementation per provider. Implementations must not retry
/// internally; upstream failures surface as `TransientProviderError` so the
/// caller can decide on a retry policy.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The provider this client speaks for.
    fn provider(&self) -> Provider;

    /// Validates the credential and returns the normalized profile.
    ///
    /// # Errors
    ///
    /// - `InvalidCredential` when the credential is rejected (bad signature,
    ///   issuer/audience mismatch, wrong credential kind, provider 4xx).
    /// - `TransientProviderError` when the provider is unreachable or
    ///   returns a 5xx status.
    async fn validate(&self, credential: &ProviderCredential) -> AuthResult<ExternalProfile>;
}

/// Builds the configured provider client set.
///
/// Providers absent from the configuration are simply not registered;
/// logins naming them fail with `ProviderNotConfigured`.
///
/// # Errors
///
/// Returns a `Configuration` error if any configured provider section is
/// invalid (unparseable key material, bad endpoint).
pub fn build_provider_clients(
    config: &ProvidersConfig,
) -> AuthResult<HashMap<Provider, Arc<dyn ProviderClient>>> {
    let mut clients: HashMap<Provider, Arc<dyn ProviderClient>> = HashMap::new();

    if let Some(google) = &config.google {
        clients.insert(Provider::Google, Arc::new(GoogleClient::new(google)?));
    }
    if let Some(apple) = &config.apple {
        clients.insert(Provider::Apple, Arc::new(AppleClient::new(apple)?));
    }
    if let Some(kakao) = &config.kakao {
        clients.insert(Provider::Kakao, Arc::new(KakaoClient::new(kakao)?));
    }

    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_as_str() {
        assert_eq!(Provider::Google.as_str(), "google");
        assert_eq!(Provider::Apple.as_str(), "apple");
        assert_eq!(Provider::Kakao.as_str(), "kakao");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("kakao".parse::<Provider>().unwrap(), Provider::Kakao);
        assert!("naver".parse::<Provider>().is_err());
    }

    #[test]
    fn test_derived_uid() {
        assert_eq!(Provider::Kakao.derived_uid("12345"), "kakao_12345");
        assert_eq!(Provider::Google.derived_uid("abc"), "google_abc");
        // Distinct pairs never collide.
        assert_ne!(
            Provider::Google.derived_uid("12345"),
            Provider::Kakao.derived_uid("12345")
        );
    }

    #[test]
    fn test_provider_serde_lowercase() {
        let json = serde_json::to_string(&Provider::Kakao).unwrap();
        assert_eq!(json, "\"kakao\"");

        let back: Provider = serde_json::from_str("\"apple\"").unwrap();
        assert_eq!(back, Provider::Apple);
    }

    #[test]
    fn test_credential_tagged_serde() {
        let json = r#"{"kind":"access_token","access_token":"opaque"}"#;
        let credential: ProviderCredential = serde_json::from_str(json).unwrap();
        assert!(matches!(
            credential,
            ProviderCredential::AccessToken { ref access_token } if access_token == "opaque"
        ));
    }

    #[test]
    fn test_profile_builder() {
        let profile = ExternalProfile::new(Provider::Google, "g-123")
            .with_display_name("Jamie")
            .with_email("jamie@example.com")
            .with_email_verified(true);

        assert_eq!(profile.provider_user_id, "g-123");
        assert_eq!(profile.display_name.as_deref(), Some("Jamie"));
        assert_eq!(profile.email_verified, Some(true));
        assert!(profile.photo_url.is_none());
    }
}

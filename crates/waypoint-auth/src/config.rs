//! Identity bridge configuration.
//!
//! All settings are deserializable from TOML with sensible defaults, so a
//! minimal deployment only supplies the signing secret and the provider
//! sections it actually uses.
//!
//! # Example (TOML)
//!
//! ```toml
//! [token]
//! ttl = "1h"
//!
//! [token.signing_key]
//! kid = "2024-06"
//! secret = "..."
//!
//! [admission]
//! login_limit = 5
//! window = "60s"
//!
//! [providers.kakao]
//! endpoint = "https://kapi.kakao.com/v2/user/me"
//! request_timeout = "5s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the identity bridge.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Session token settings.
    pub token: TokenConfig,

    /// Admission control settings.
    pub admission: AdmissionConfig,

    /// External provider settings. Unconfigured providers are not served.
    pub providers: ProvidersConfig,
}

impl BridgeConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or missing value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token.validate()?;
        self.admission.validate()?;

        if self.providers.google.is_none()
            && self.providers.apple.is_none()
            && self.providers.kakao.is_none()
        {
            return Err(ConfigError::MissingValue(
                "at least one identity provider must be configured".to_string(),
            ));
        }

        if let Some(google) = &self.providers.google {
            google.validate("providers.google")?;
        }
        if let Some(apple) = &self.providers.apple {
            apple.validate("providers.apple")?;
        }

        Ok(())
    }
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// The `iss` claim stamped into issued tokens.
    pub issuer: String,

    /// Session token lifetime. Expiry is absolute: `exp = iat + ttl`.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// The active signing key. New tokens are always signed with this key.
    pub signing_key: SigningKeyConfig,

    /// Previously active keys still accepted for verification.
    ///
    /// Lets key rotation happen without invalidating just-issued tokens;
    /// drop a key from this list to hard-revoke everything it signed.
    pub grace_keys: Vec<SigningKeyConfig>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "waypoint".to_string(),
            ttl: Duration::from_secs(3600), // 1 hour
            signing_key: SigningKeyConfig::default(),
            grace_keys: Vec::new(),
        }
    }
}

impl TokenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingValue("token.issuer".to_string()));
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token.ttl must be positive".to_string(),
            ));
        }
        self.signing_key.validate("token.signing_key")?;
        for key in &self.grace_keys {
            key.validate("token.grace_keys")?;
        }
        Ok(())
    }
}

/// A named HMAC signing key.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningKeyConfig {
    /// Key identifier stamped into the token header.
    pub kid: String,

    /// The HMAC secret.
    pub secret: String,
}

impl SigningKeyConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.kid.is_empty() {
            return Err(ConfigError::MissingValue(format!("{section}.kid")));
        }
        if self.secret.len() < 32 {
            return Err(ConfigError::InvalidValue(format!(
                "{section}.secret must be at least 32 bytes"
            )));
        }
        Ok(())
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Admitted requests per caller per window on login-class endpoints.
    pub login_limit: u32,

    /// Fixed window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            login_limit: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl AdmissionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.login_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "admission.login_limit must be positive".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ConfigError::InvalidValue(
                "admission.window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-provider configuration sections.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Google sign-in (signed ID token).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<SignedProviderConfig>,

    /// Apple sign-in (signed ID token + authorization code).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple: Option<SignedProviderConfig>,

    /// Kakao login (opaque token introspection).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kakao: Option<IntrospectionProviderConfig>,
}

/// Configuration for a provider that issues signed ID tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignedProviderConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim (our client id at the provider).
    pub audience: String,

    /// Verification keys, looked up by the token's `kid` header.
    pub keys: Vec<VerificationKeyConfig>,

    /// Clock skew tolerance for token validation.
    #[serde(default = "default_leeway", with = "humantime_serde")]
    pub leeway: Duration,
}

fn default_leeway() -> Duration {
    Duration::from_secs(30)
}

impl SignedProviderConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingValue(format!("{section}.issuer")));
        }
        if self.audience.is_empty() {
            return Err(ConfigError::MissingValue(format!("{section}.audience")));
        }
        if self.keys.is_empty() {
            return Err(ConfigError::MissingValue(format!("{section}.keys")));
        }
        Ok(())
    }
}

/// A single provider verification key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationKeyConfig {
    /// Key identifier matching the token's `kid` header.
    pub kid: String,

    /// Signing algorithm of this key.
    pub algorithm: KeyAlgorithm,

    /// Key material: shared secret for HS256, PEM text for RS256.
    pub material: String,
}

/// Supported provider token signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// HMAC with SHA-256 (shared secret).
    Hs256,
    /// RSA with SHA-256 (PEM public key).
    Rs256,
}

/// Configuration for a provider validated by token introspection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionProviderConfig {
    /// The introspection endpoint receiving the bearer token.
    pub endpoint: Url,

    /// Bound on each introspection call. A slow upstream must not be able
    /// to block a resolver request indefinitely.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for IntrospectionProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://kapi.kakao.com/v2/user/me")
                .expect("default endpoint is a valid url"),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing configuration value: {0}")]
    MissingValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.token.signing_key = SigningKeyConfig {
            kid: "k1".to_string(),
            secret: "0123456789abcdef0123456789abcdef".to_string(),
        };
        config.providers.kakao = Some(IntrospectionProviderConfig::default());
        config
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.token.ttl, Duration::from_secs(3600));
        assert_eq!(config.admission.login_limit, 5);
        assert_eq!(config.admission.window, Duration::from_secs(60));
        assert!(config.providers.google.is_none());
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_short_secret() {
        let mut config = valid_config();
        config.token.signing_key.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_no_providers() {
        let mut config = valid_config();
        config.providers.kakao = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limit() {
        let mut config = valid_config();
        config.admission.login_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
            [token]
            issuer = "waypoint"
            ttl = "30m"

            [token.signing_key]
            kid = "2024-06"
            secret = "0123456789abcdef0123456789abcdef"

            [admission]
            login_limit = 10
            window = "2m"

            [providers.kakao]
            endpoint = "https://kapi.kakao.com/v2/user/me"
            request_timeout = "5s"

            [providers.google]
            issuer = "https://accounts.google.com"
            audience = "waypoint-app"

            [[providers.google.keys]]
            kid = "g1"
            algorithm = "hs256"
            material = "secret-material"
        "#;

        let config: BridgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.token.ttl, Duration::from_secs(1800));
        assert_eq!(config.admission.login_limit, 10);
        assert_eq!(config.admission.window, Duration::from_secs(120));

        let google = config.providers.google.as_ref().unwrap();
        assert_eq!(google.audience, "waypoint-app");
        assert_eq!(google.leeway, Duration::from_secs(30));
        assert_eq!(google.keys[0].algorithm, KeyAlgorithm::Hs256);

        let kakao = config.providers.kakao.as_ref().unwrap();
        assert_eq!(kakao.request_timeout, Duration::from_secs(5));

        assert!(config.validate().is_ok());
    }
}

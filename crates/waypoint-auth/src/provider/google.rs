//! Google sign-in provider client.
//!
//! Google issues a signed OIDC ID token; validation is purely
//! cryptographic and never leaves the process.

use async_trait::async_trait;

use super::id_token::SignedTokenValidator;
use super::{ExternalProfile, Provider, ProviderClient, ProviderCredential};
use crate::AuthResult;
use crate::config::SignedProviderConfig;
use crate::error::AuthError;

/// Validates Google ID token credentials.
pub struct GoogleClient {
    validator: SignedTokenValidator,
}

impl GoogleClient {
    /// Builds a client from the Google provider configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for unparseable key material.
    pub fn new(config: &SignedProviderConfig) -> AuthResult<Self> {
        Ok(Self {
            validator: SignedTokenValidator::new(config)?,
        })
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn validate(&self, credential: &ProviderCredential) -> AuthResult<ExternalProfile> {
        let ProviderCredential::IdToken { id_token } = credential else {
            return Err(AuthError::invalid_credential(
                "google expects an ID token credential",
            ));
        };

        let claims = self.validator.validate(id_token)?;

        let mut profile = ExternalProfile::new(Provider::Google, claims.sub);
        profile.display_name = claims.name;
        profile.photo_url = claims.picture;
        profile.email = claims.email;
        profile.email_verified = claims.email_verified;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Signature verification is covered in `id_token`; these tests pin the
    // credential kind contract.
    #[tokio::test]
    async fn test_rejects_wrong_credential_kind() {
        let config = SignedProviderConfig {
            issuer: "https://accounts.google.com".to_string(),
            audience: "waypoint-app".to_string(),
            keys: vec![crate::config::VerificationKeyConfig {
                kid: "k1".to_string(),
                algorithm: crate::config::KeyAlgorithm::Hs256,
                material: "shared-test-secret-shared-test-secret".to_string(),
            }],
            leeway: std::time::Duration::from_secs(30),
        };
        let client = GoogleClient::new(&config).unwrap();

        let err = client
            .validate(&ProviderCredential::AccessToken {
                access_token: "opaque".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }
}

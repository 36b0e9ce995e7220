//! Apple sign-in provider client.
//!
//! Apple issues a signed ID token together with a single-use authorization
//! code. The ID token carries the identity and is verified
//! cryptographically; a credential missing either part is rejected.

use async_trait::async_trait;

use super::id_token::SignedTokenValidator;
use super::{ExternalProfile, Provider, ProviderClient, ProviderCredential};
use crate::AuthResult;
use crate::config::SignedProviderConfig;
use crate::error::AuthError;

/// Validates Apple ID token + authorization code credentials.
pub struct AppleClient {
    validator: SignedTokenValidator,
}

impl AppleClient {
    /// Builds a client from the Apple provider configuration.
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
impl ProviderClient for AppleClient {
    fn provider(&self) -> Provider {
        Provider::Apple
    }

    async fn validate(&self, credential: &ProviderCredential) -> AuthResult<ExternalProfile> {
        let ProviderCredential::IdTokenWithCode {
            id_token,
            authorization_code,
        } = credential
        else {
            return Err(AuthError::invalid_credential(
                "apple expects an ID token with authorization code",
            ));
        };

        if authorization_code.trim().is_empty() {
            return Err(AuthError::invalid_credential(
                "apple authorization code is empty",
            ));
        }

        let claims = self.validator.validate(id_token)?;

        let mut profile = ExternalProfile::new(Provider::Apple, claims.sub);
        profile.display_name = claims.name;
        profile.email = claims.email;
        profile.email_verified = claims.email_verified;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeyAlgorithm, VerificationKeyConfig};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use std::time::Duration;

    const SECRET: &str = "shared-test-secret-shared-test-secret";

    fn test_client() -> AppleClient {
        let config = SignedProviderConfig {
            issuer: "https://appleid.apple.com".to_string(),
            audience: "com.waypoint.app".to_string(),
            keys: vec![VerificationKeyConfig {
                kid: "k1".to_string(),
                algorithm: KeyAlgorithm::Hs256,
                material: SECRET.to_string(),
            }],
            leeway: Duration::from_secs(30),
        };
        AppleClient::new(&config).unwrap()
    }

    fn test_id_token() -> String {
        #[derive(serde::Serialize)]
        struct Claims {
            sub: String,
            iss: String,
            aud: String,
            exp: i64,
        }
        let claims = Claims {
            sub: "001234.abcdef".to_string(),
            iss: "https://appleid.apple.com".to_string(),
            aud: "com.waypoint.app".to_string(),
            exp: time::OffsetDateTime::now_utc().unix_timestamp() + 600,
        };
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn test_valid_credential_accepted() {
        let client = test_client();
        let profile = client
            .validate(&ProviderCredential::IdTokenWithCode {
                id_token: test_id_token(),
                authorization_code: "c-abc123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(profile.provider, Provider::Apple);
        assert_eq!(profile.provider_user_id, "001234.abcdef");
    }

    #[tokio::test]
    async fn test_empty_authorization_code_rejected() {
        let client = test_client();
        let err = client
            .validate(&ProviderCredential::IdTokenWithCode {
                id_token: test_id_token(),
                authorization_code: "  ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }

    #[tokio::test]
    async fn test_rejects_wrong_credential_kind() {
        let client = test_client();
        let err = client
            .validate(&ProviderCredential::IdToken {
                id_token: test_id_token(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }
}

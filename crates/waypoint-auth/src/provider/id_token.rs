//! Shared signed ID token validation.
//!
//! Both signed-token providers (Google, Apple) verify the credential the
//! same way: resolve the verification key by `kid`, then check signature,
//! issuer and audience before trusting any claim. Any mismatch is an
//! `InvalidCredential` error; no claim is read from an unverified token.

use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;

use crate::AuthResult;
use crate::config::{KeyAlgorithm, SignedProviderConfig};
use crate::error::AuthError;

/// Claims extracted from a verified provider ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    /// The provider-scoped subject identifier.
    pub sub: String,

    /// Display name claim.
    #[serde(default)]
    pub name: Option<String>,

    /// Profile photo claim.
    #[serde(default)]
    pub picture: Option<String>,

    /// Email claim.
    #[serde(default)]
    pub email: Option<String>,

    /// Email verification claim.
    #[serde(default)]
    pub email_verified: Option<bool>,
}

/// Verifies provider-signed ID tokens against a configured key set.
pub struct SignedTokenValidator {
    issuer: String,
    audience: String,
    keys: HashMap<String, (Algorithm, DecodingKey)>,
    leeway: u64,
}

impl SignedTokenValidator {
    /// Builds a validator from a provider's signed-token configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the key material cannot be parsed.
    pub fn new(config: &SignedProviderConfig) -> AuthResult<Self> {
        let mut keys = HashMap::new();
        for key in &config.keys {
            let (algorithm, decoding_key) = match key.algorithm {
                KeyAlgorithm::Hs256 => (
                    Algorithm::HS256,
                    DecodingKey::from_secret(key.material.as_bytes()),
                ),
                KeyAlgorithm::Rs256 => (
                    Algorithm::RS256,
                    DecodingKey::from_rsa_pem(key.material.as_bytes()).map_err(|e| {
                        AuthError::configuration(format!(
                            "invalid RSA key material for kid {}: {e}",
                            key.kid
                        ))
                    })?,
                ),
            };
            keys.insert(key.kid.clone(), (algorithm, decoding_key));
        }

        if keys.is_empty() {
            return Err(AuthError::configuration(
                "signed provider requires at least one verification key",
            ));
        }

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            keys,
            leeway: config.leeway.as_secs(),
        })
    }

    /// Verifies the token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` for any signature or claim failure,
    /// including an unknown or missing `kid`.
    pub fn validate(&self, id_token: &str) -> AuthResult<IdTokenClaims> {
        let header = decode_header(id_token)
            .map_err(|e| AuthError::invalid_credential(format!("malformed ID token: {e}")))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_credential("ID token is missing key id"))?;

        let (algorithm, key) = self
            .keys
            .get(&kid)
            .ok_or_else(|| AuthError::invalid_credential(format!("unknown signing key: {kid}")))?;

        let mut validation = Validation::new(*algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.leeway = self.leeway;

        let data = decode::<IdTokenClaims>(id_token, key, &validation)
            .map_err(|e| AuthError::invalid_credential(format!("ID token rejected: {e}")))?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationKeyConfig;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;
    use std::time::Duration;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iss: String,
        aud: String,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    }

    fn test_config() -> SignedProviderConfig {
        SignedProviderConfig {
            issuer: "https://accounts.example.com".to_string(),
            audience: "waypoint-app".to_string(),
            keys: vec![VerificationKeyConfig {
                kid: "k1".to_string(),
                algorithm: KeyAlgorithm::Hs256,
                material: "shared-test-secret-shared-test-secret".to_string(),
            }],
            leeway: Duration::from_secs(30),
        }
    }

    fn sign(claims: &TestClaims, kid: &str, secret: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(
            &header,
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> TestClaims {
        TestClaims {
            sub: "user-1".to_string(),
            iss: "https://accounts.example.com".to_string(),
            aud: "waypoint-app".to_string(),
            exp: time::OffsetDateTime::now_utc().unix_timestamp() + 600,
            name: Some("Jamie".to_string()),
        }
    }

    #[test]
    fn test_valid_token_accepted() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "k1", "shared-test-secret-shared-test-secret");

        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name.as_deref(), Some("Jamie"));
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "k1", "a-completely-different-secret-value");

        let err = validator.validate(&token).unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        let mut claims = valid_claims();
        claims.iss = "https://evil.example.com".to_string();
        let token = sign(&claims, "k1", "shared-test-secret-shared-test-secret");

        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        let mut claims = valid_claims();
        claims.aud = "some-other-app".to_string();
        let token = sign(&claims, "k1", "shared-test-secret-shared-test-secret");

        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_unknown_kid_rejected() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "k9", "shared-test-secret-shared-test-secret");

        let err = validator.validate(&token).unwrap_err();
        assert_eq!(err.code(), "invalid_credential");
    }

    #[test]
    fn test_garbage_token_rejected() {
        let validator = SignedTokenValidator::new(&test_config()).unwrap();
        assert!(validator.validate("not-a-jwt").is_err());
    }

    #[test]
    fn test_empty_key_set_rejected() {
        let mut config = test_config();
        config.keys.clear();
        assert!(SignedTokenValidator::new(&config).is_err());
    }
}

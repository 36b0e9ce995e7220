//! JWT session token signing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::AuthError;

/// Claims carried by a session token.
///
/// Immutable once issued; `exp` is always `iat + ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The internal identity this token asserts.
    pub sub: String,

    /// Issuing bridge.
    pub iss: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// Custom claims copied from the identity at issue time.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: BTreeMap<String, String>,
}

/// Why a session token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The token could not be parsed at all.
    #[error("token is malformed")]
    Malformed,

    /// The token's expiry has passed.
    #[error("token has expired")]
    Expired,

    /// The signature does not verify against the named key.
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The token names a signing key the bridge no longer recognizes.
    #[error("token signer is unknown")]
    UnknownSigner,
}

impl From<VerificationError> for AuthError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::Malformed => Self::TokenMalformed,
            VerificationError::Expired => Self::TokenExpired,
            VerificationError::SignatureInvalid | VerificationError::UnknownSigner => {
                Self::SignatureInvalid
            }
        }
    }
}

/// Mints and verifies session tokens.
///
/// The signing key set is read-only after construction and shared by
/// reference across requests.
pub struct TokenSigner {
    issuer: String,
    ttl: std::time::Duration,
    active_kid: String,
    encoding_key: EncodingKey,
    /// Active key plus grace keys, by kid.
    decoding_keys: HashMap<String, DecodingKey>,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    /// Builds a signer from the token configuration.
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let mut decoding_keys = HashMap::new();
        decoding_keys.insert(
            config.signing_key.kid.clone(),
            DecodingKey::from_secret(config.signing_key.secret.as_bytes()),
        );
        for grace in &config.grace_keys {
            decoding_keys.insert(
                grace.kid.clone(),
                DecodingKey::from_secret(grace.secret.as_bytes()),
            );
        }

        Self {
            issuer: config.issuer.clone(),
            ttl: config.ttl,
            active_kid: config.signing_key.kid.clone(),
            encoding_key: EncodingKey::from_secret(config.signing_key.secret.as_bytes()),
            decoding_keys,
            clock,
        }
    }

    /// The session token lifetime.
    #[must_use]
    pub fn ttl(&self) -> std::time::Duration {
        self.ttl
    }

    /// Issues a signed session token for `uid` with the given claims.
    ///
    /// # Errors
    ///
    /// Returns an `Internal` error if encoding fails.
    pub fn issue(&self, uid: &str, claims: BTreeMap<String, String>) -> AuthResult<String> {
        let now = self.clock.now().unix_timestamp();
        let session = SessionClaims {
            sub: uid.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
            claims,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.active_kid.clone());

        encode(&header, &session, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))
    }

    /// Verifies a session token and returns its claims.
    ///
    /// Pure and side-effect-free. Expiry is checked against the injected
    /// clock, so an otherwise valid signature never rescues an expired
    /// token.
    ///
    /// # Errors
    ///
    /// See [`VerificationError`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, VerificationError> {
        let header = decode_header(token).map_err(|_| VerificationError::Malformed)?;

        let kid = header.kid.as_deref().unwrap_or(&self.active_kid);
        let key = self
            .decoding_keys
            .get(kid)
            .ok_or(VerificationError::UnknownSigner)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        let data = decode::<SessionClaims>(token, key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    VerificationError::SignatureInvalid
                }
                _ => VerificationError::Malformed,
            }
        })?;

        let now = self.clock.now().unix_timestamp();
        if now >= data.claims.exp {
            return Err(VerificationError::Expired);
        }

        Ok(data.claims)
    }
}

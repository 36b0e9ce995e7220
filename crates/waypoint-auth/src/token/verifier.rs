//! Session token verification for protected calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::signer::{SessionClaims, TokenSigner};
use crate::AuthResult;
use crate::error::AuthError;

/// A capability gate: the claim a protected call requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredClaim {
    /// Claim key, e.g. `role`.
    pub key: String,

    /// Exact value the claim must have, e.g. `admin`.
    pub value: String,
}

impl RequiredClaim {
    /// Creates a required claim.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The administrative role gate.
    #[must_use]
    pub fn admin() -> Self {
        Self::new("role", "admin")
    }
}

/// Result of an optional-authentication token check.
///
/// Never an error: an invalid token yields `valid = false` with a stable
/// reason code instead of failing the call.
#[derive(Debug, Clone, Serialize)]
pub struct TokenCheck {
    /// Whether the token verified.
    pub valid: bool,

    /// The asserted uid, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// The decoded claims, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<BTreeMap<String, String>>,

    /// The rejection code, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Validates previously issued session tokens.
pub struct SessionVerifier {
    signer: Arc<TokenSigner>,
}

impl SessionVerifier {
    /// Creates a verifier sharing the signer's key set.
    #[must_use]
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }

    /// Verifies a token as a mandatory gate.
    ///
    /// # Errors
    ///
    /// - `TokenExpired` / `TokenMalformed` / `SignatureInvalid` when the
    ///   token itself fails verification.
    /// - `Forbidden` when `required` is given and the decoded claims do not
    ///   carry it with the exact value.
    pub fn authorize(
        &self,
        token: &str,
        required: Option<&RequiredClaim>,
    ) -> AuthResult<SessionClaims> {
        let claims = self.signer.verify(token)?;

        if let Some(required) = required {
            let held = claims.claims.get(&required.key);
            if held.map(String::as_str) != Some(required.value.as_str()) {
                return Err(AuthError::forbidden(format!(
                    "missing required claim {}={}",
                    required.key, required.value
                )));
            }
        }

        Ok(claims)
    }

    /// Checks a token for optional authentication.
    ///
    /// Verification failures are reported in-band as `valid = false` plus a
    /// reason code rather than as an error.
    #[must_use]
    pub fn check(&self, token: &str) -> TokenCheck {
        match self.signer.verify(token) {
            Ok(claims) => TokenCheck {
                valid: true,
                uid: Some(claims.sub),
                claims: Some(claims.claims),
                reason: None,
            },
            Err(error) => TokenCheck {
                valid: false,
                uid: None,
                claims: None,
                reason: Some(AuthError::from(error).code()),
            },
        }
    }
}

//! Resolution of external credentials into sessions.
//!
//! [`IdentityResolver`] is the bridge's front door. It owns the provider
//! clients, the identity store, the token signer and the admission
//! controller, and runs every flow in the same order: admit the caller,
//! validate what they presented, touch the store, then issue a token.
//!
//! # Example
//!
//! ```ignore
//! let resolver = IdentityResolver::from_config(&config, store, clock)?;
//! let login = resolver
//!     .social_login("203.0.113.7", Provider::Kakao, &credential)
//!     .await?;
//! println!("issued session for {}", login.identity.uid);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::AuthResult;
use crate::admission::{AdmissionController, AdmissionDecision, Endpoint};
use crate::clock::Clock;
use crate::config::BridgeConfig;
use crate::error::AuthError;
use crate::provider::{Provider, ProviderClient, ProviderCredential, build_provider_clients};
use crate::store::{IdentityStore, InternalIdentity, ProfileHints};
use crate::token::{RequiredClaim, SessionClaims, SessionVerifier, TokenCheck, TokenSigner};

/// The identity fields callers get back. A projection of
/// [`InternalIdentity`] without bookkeeping timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct IdentitySummary {
    pub uid: String,
    pub anonymous: bool,
    pub linked_providers: Vec<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl From<&InternalIdentity> for IdentitySummary {
    fn from(identity: &InternalIdentity) -> Self {
        Self {
            uid: identity.uid.clone(),
            anonymous: identity.anonymous,
            linked_providers: identity.linked_providers.iter().copied().collect(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
        }
    }
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Signed session token asserting `identity.uid`.
    pub token: String,

    /// The resolved identity.
    pub identity: IdentitySummary,
}

/// Orchestrates credential validation, identity resolution and token
/// issuance.
pub struct IdentityResolver {
    providers: HashMap<Provider, Arc<dyn ProviderClient>>,
    store: Arc<dyn IdentityStore>,
    signer: Arc<TokenSigner>,
    verifier: SessionVerifier,
    admission: AdmissionController,
}

impl IdentityResolver {
    /// Creates a resolver from explicit parts. Used directly by tests;
    /// servers go through [`from_config`](Self::from_config).
    #[must_use]
    pub fn new(
        providers: HashMap<Provider, Arc<dyn ProviderClient>>,
        store: Arc<dyn IdentityStore>,
        signer: Arc<TokenSigner>,
        admission: AdmissionController,
    ) -> Self {
        let verifier = SessionVerifier::new(signer.clone());
        Self {
            providers,
            store,
            signer,
            verifier,
            admission,
        }
    }

    /// Builds provider clients, signer and admission control from
    /// validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when a provider section cannot be
    /// turned into a client.
    pub fn from_config(
        config: &BridgeConfig,
        store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let providers = build_provider_clients(&config.providers)?;
        let signer = Arc::new(TokenSigner::new(&config.token, clock.clone()));
        let admission = AdmissionController::new(&config.admission, clock);
        Ok(Self::new(providers, store, signer, admission))
    }

    /// The admission controller, for the server's prune task.
    #[must_use]
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Logs a caller in with a provider credential.
    ///
    /// Resolves `(provider, provider_user_id)` to the same internal
    /// identity on every call and issues a session token for it.
    ///
    /// # Errors
    ///
    /// - `RateLimited` before any credential work when the caller's window
    ///   is full.
    /// - `ProviderNotConfigured` when no client is registered for
    ///   `provider`.
    /// - `InvalidCredential` / `TransientProviderError` from validation.
    pub async fn social_login(
        &self,
        caller: &str,
        provider: Provider,
        credential: &ProviderCredential,
    ) -> AuthResult<LoginResponse> {
        self.admit(caller, Endpoint::Login)?;

        let profile = self.client(provider)?.validate(credential).await?;
        let identity = self
            .store
            .get_or_create(
                profile.provider,
                &profile.provider_user_id,
                ProfileHints::from(&profile),
            )
            .await?;

        tracing::info!(
            provider = provider.as_str(),
            uid = %identity.uid,
            "social login resolved"
        );

        self.issue_for(&identity)
    }

    /// Creates an anonymous identity and a session for it.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when the caller's window is full, or a storage
    /// error.
    pub async fn create_anonymous(&self, caller: &str) -> AuthResult<LoginResponse> {
        self.admit(caller, Endpoint::Anonymous)?;

        let identity = self.store.create_anonymous().await?;
        tracing::info!(uid = %identity.uid, "anonymous identity created");
        self.issue_for(&identity)
    }

    /// Converts the caller's anonymous identity into a permanent one.
    ///
    /// The caller proves control of the anonymous identity with its session
    /// token and of the external identity with a provider credential. The
    /// uid survives the conversion; the response carries a fresh token for
    /// the now-permanent identity.
    ///
    /// # Errors
    ///
    /// - `RateLimited` when the caller's window is full.
    /// - Token errors when `token` does not verify.
    /// - `InvalidCredential` / `TransientProviderError` from validation.
    /// - `InvalidState` when the token's identity is not anonymous.
    /// - `IdentityConflict` when the external identity already belongs to a
    ///   different internal identity.
    pub async fn link_provider(
        &self,
        caller: &str,
        token: &str,
        provider: Provider,
        credential: &ProviderCredential,
    ) -> AuthResult<LoginResponse> {
        self.admit(caller, Endpoint::Link)?;

        let session = self.verifier.authorize(token, None)?;
        let profile = self.client(provider)?.validate(credential).await?;
        let identity = self
            .store
            .link(
                &session.sub,
                profile.provider,
                &profile.provider_user_id,
                ProfileHints::from(&profile),
            )
            .await?;

        tracing::info!(
            provider = provider.as_str(),
            uid = %identity.uid,
            "anonymous identity linked"
        );

        self.issue_for(&identity)
    }

    /// Verifies a session token as a mandatory gate.
    ///
    /// Pure local computation on the hot path of every protected call, so
    /// no admission check applies here; the login-class budget covers only
    /// the endpoints that spend provider or store work.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` / `TokenMalformed` / `SignatureInvalid` when
    /// the token fails verification.
    pub fn verify_token(&self, token: &str) -> AuthResult<SessionClaims> {
        self.verifier.authorize(token, None)
    }

    /// Checks a session token without failing on an invalid one. Token
    /// problems are reported in the returned [`TokenCheck`].
    #[must_use]
    pub fn check_token(&self, token: &str) -> TokenCheck {
        self.verifier.check(token)
    }

    /// Overwrites an identity's custom claims. Requires a session holding
    /// `role=admin`.
    ///
    /// The new claims take effect on tokens issued afterwards; tokens
    /// already in flight keep their embedded claims until they expire.
    ///
    /// # Errors
    ///
    /// - `Forbidden` when `admin_token` does not carry `role=admin`.
    /// - `InvalidState` when no identity has this uid.
    pub async fn set_custom_claims(
        &self,
        admin_token: &str,
        uid: &str,
        claims: BTreeMap<String, String>,
    ) -> AuthResult<IdentitySummary> {
        self.verifier
            .authorize(admin_token, Some(&RequiredClaim::admin()))?;

        let identity = self.store.set_claims(uid, claims).await?;
        tracing::info!(uid = %identity.uid, "custom claims replaced");
        Ok(IdentitySummary::from(&identity))
    }

    fn admit(&self, caller: &str, endpoint: Endpoint) -> AuthResult<()> {
        match self.admission.admit(caller, endpoint) {
            AdmissionDecision::Allowed => Ok(()),
            AdmissionDecision::RateLimited { retry_after } => {
                Err(AuthError::rate_limited(retry_after))
            }
        }
    }

    fn client(&self, provider: Provider) -> AuthResult<&Arc<dyn ProviderClient>> {
        self.providers
            .get(&provider)
            .ok_or_else(|| AuthError::provider_not_configured(provider.as_str()))
    }

    fn issue_for(&self, identity: &InternalIdentity) -> AuthResult<LoginResponse> {
        let token = self
            .signer
            .issue(&identity.uid, identity.custom_claims.clone())?;
        Ok(LoginResponse {
            token,
            identity: IdentitySummary::from(identity),
        })
    }
}

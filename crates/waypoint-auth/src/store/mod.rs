//! Identity storage.
//!
//! Defines the durable mapping from external identities to internal ones.
//! The trait is the atomicity boundary: `get_or_create` and `link` must be
//! atomic with respect to the `(provider, provider_user_id)` ownership
//! index, so concurrent first logins converge on exactly one record.
//!
//! # Implementations
//!
//! - [`MemoryIdentityStore`] - process-local store for single-node
//!   deployments and tests. A remote backend implements the same trait.

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::provider::{ExternalProfile, Provider};

pub use memory::MemoryIdentityStore;

/// Prefix of the anonymous uid namespace.
///
/// Provider-derived uids always start with a provider name, so the two
/// namespaces cannot collide.
pub const ANONYMOUS_UID_PREFIX: &str = "anon_";

/// Profile fields offered to the store at creation or link time.
///
/// Hints only: the store uses them to populate missing fields on a new or
/// newly linked identity and never overwrites data already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileHints {
    /// Display name hint.
    pub display_name: Option<String>,

    /// Photo URL hint.
    pub photo_url: Option<String>,
}

impl From<&ExternalProfile> for ProfileHints {
    fn from(profile: &ExternalProfile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            photo_url: profile.photo_url.clone(),
        }
    }
}

/// This system's durable identity record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalIdentity {
    /// Stable internal identifier. Derived as `"<provider>_<id>"` for
    /// provider logins, `"anon_<random>"` for anonymous identities. Never
    /// changes, not even across linking.
    pub uid: String,

    /// Whether this identity is still anonymous. Transitions to `false`
    /// exactly once, on a successful link, and never back.
    pub anonymous: bool,

    /// Providers whose external identity this record owns.
    pub linked_providers: BTreeSet<Provider>,

    /// Display name, frozen at creation or first link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Photo URL, frozen at creation or first link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Administrative claims copied into issued session tokens.
    /// Recognized keys are documented by the resolver (`role`).
    #[serde(default)]
    pub custom_claims: BTreeMap<String, String>,

    /// When the identity was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the identity was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl InternalIdentity {
    /// Creates the identity owning `(provider, provider_user_id)`.
    #[must_use]
    pub fn from_provider(
        provider: Provider,
        provider_user_id: &str,
        hints: ProfileHints,
        now: OffsetDateTime,
    ) -> Self {
        let mut linked_providers = BTreeSet::new();
        linked_providers.insert(provider);

        Self {
            uid: provider.derived_uid(provider_user_id),
            anonymous: false,
            linked_providers,
            display_name: hints.display_name,
            photo_url: hints.photo_url,
            custom_claims: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a fresh anonymous identity with a random uid.
    #[must_use]
    pub fn new_anonymous(now: OffsetDateTime) -> Self {
        Self {
            uid: format!("{ANONYMOUS_UID_PREFIX}{}", uuid::Uuid::new_v4().simple()),
            anonymous: true,
            linked_providers: BTreeSet::new(),
            display_name: None,
            photo_url: None,
            custom_claims: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if this identity owns an external identity from the
    /// given provider.
    #[must_use]
    pub fn is_linked_to(&self, provider: Provider) -> bool {
        self.linked_providers.contains(&provider)
    }
}

/// Durable, idempotent identity storage.
///
/// Identities are never deleted by the bridge; deletion is an external
/// administrative concern.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the identity owning `(provider, provider_user_id)`, creating
    /// it if absent.
    ///
    /// Idempotent and atomic: two concurrent calls racing on the same pair
    /// must converge on exactly one record, with the loser observing the
    /// winner's record. Hints never overwrite an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_or_create(
        &self,
        provider: Provider,
        provider_user_id: &str,
        hints: ProfileHints,
    ) -> AuthResult<InternalIdentity>;

    /// Creates a fresh anonymous identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_anonymous(&self) -> AuthResult<InternalIdentity>;

    /// Attaches `(provider, provider_user_id)` to the anonymous identity at
    /// `anonymous_uid`, making it permanent.
    ///
    /// All-or-nothing: on any failure both the anonymous identity and any
    /// conflicting identity are left completely unmodified.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if `anonymous_uid` does not name a currently
    ///   anonymous identity.
    /// - `IdentityConflict` if the external identity is already owned by a
    ///   different internal identity.
    async fn link(
        &self,
        anonymous_uid: &str,
        provider: Provider,
        provider_user_id: &str,
        hints: ProfileHints,
    ) -> AuthResult<InternalIdentity>;

    /// Overwrites the custom claims of an identity. Administrative.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no identity has this uid.
    async fn set_claims(
        &self,
        uid: &str,
        claims: BTreeMap<String, String>,
    ) -> AuthResult<InternalIdentity>;

    /// Looks up an identity by uid.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_uid(&self, uid: &str) -> AuthResult<Option<InternalIdentity>>;
}

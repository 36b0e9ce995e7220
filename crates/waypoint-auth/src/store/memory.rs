//! In-memory identity store.
//!
//! Keeps the identity map and the `(provider, provider_user_id)` ownership
//! index behind a single lock, so `get_or_create` and `link` observe and
//! mutate both under one write guard. The lock is synchronous and never
//! held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;

use super::{IdentityStore, InternalIdentity, ProfileHints};
use crate::AuthResult;
use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::provider::Provider;

#[derive(Debug, Default)]
struct StoreInner {
    /// uid -> identity.
    identities: HashMap<String, InternalIdentity>,
    /// (provider, provider_user_id) -> owning uid. Uniqueness index.
    owners: HashMap<(Provider, String), String>,
}

/// Process-local [`IdentityStore`] implementation.
pub struct MemoryIdentityStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<StoreInner>,
}

impl MemoryIdentityStore {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Number of stored identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.write_or_recover().identities.len()
    }

    /// Returns `true` if the store holds no identities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_or_recover(&self) -> RwLockWriteGuard<'_, StoreInner> {
        // A poisoned lock means a panic mid-mutation elsewhere; the data is
        // still structurally valid because every mutation commits via a
        // single insert.
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_or_create(
        &self,
        provider: Provider,
        provider_user_id: &str,
        hints: ProfileHints,
    ) -> AuthResult<InternalIdentity> {
        let now = self.clock.now();
        let mut inner = self.write_or_recover();

        let owner_key = (provider, provider_user_id.to_string());
        if let Some(uid) = inner.owners.get(&owner_key) {
            // Existing record wins; hints are not applied on this path.
            let identity = inner.identities.get(uid).cloned().ok_or_else(|| {
                AuthError::storage(format!("ownership index points at missing uid {uid}"))
            })?;
            return Ok(identity);
        }

        let identity = InternalIdentity::from_provider(provider, provider_user_id, hints, now);
        inner.owners.insert(owner_key, identity.uid.clone());
        inner
            .identities
            .insert(identity.uid.clone(), identity.clone());

        tracing::debug!(uid = %identity.uid, provider = %provider, "created identity");
        Ok(identity)
    }

    async fn create_anonymous(&self) -> AuthResult<InternalIdentity> {
        let now = self.clock.now();
        let mut inner = self.write_or_recover();

        let identity = InternalIdentity::new_anonymous(now);
        inner
            .identities
            .insert(identity.uid.clone(), identity.clone());

        tracing::debug!(uid = %identity.uid, "created anonymous identity");
        Ok(identity)
    }

    async fn link(
        &self,
        anonymous_uid: &str,
        provider: Provider,
        provider_user_id: &str,
        hints: ProfileHints,
    ) -> AuthResult<InternalIdentity> {
        let now = self.clock.now();
        let mut inner = self.write_or_recover();

        // All checks happen before any write; the commit below is a single
        // insert per map, so a failed link changes nothing.
        let current = inner.identities.get(anonymous_uid).ok_or_else(|| {
            AuthError::invalid_state(format!("no identity with uid {anonymous_uid}"))
        })?;
        if !current.anonymous {
            return Err(AuthError::invalid_state(format!(
                "identity {anonymous_uid} is not anonymous"
            )));
        }

        let owner_key = (provider, provider_user_id.to_string());
        if let Some(owner) = inner.owners.get(&owner_key) {
            if owner != anonymous_uid {
                return Err(AuthError::identity_conflict(format!(
                    "{provider} identity {provider_user_id} is already owned by another account"
                )));
            }
        }

        let mut updated = current.clone();
        updated.anonymous = false;
        updated.linked_providers.insert(provider);
        if updated.display_name.is_none() {
            updated.display_name = hints.display_name;
        }
        if updated.photo_url.is_none() {
            updated.photo_url = hints.photo_url;
        }
        updated.updated_at = now;

        inner.owners.insert(owner_key, anonymous_uid.to_string());
        inner
            .identities
            .insert(anonymous_uid.to_string(), updated.clone());

        tracing::debug!(uid = %anonymous_uid, provider = %provider, "linked identity");
        Ok(updated)
    }

    async fn set_claims(
        &self,
        uid: &str,
        claims: BTreeMap<String, String>,
    ) -> AuthResult<InternalIdentity> {
        let now = self.clock.now();
        let mut inner = self.write_or_recover();

        let identity = inner
            .identities
            .get_mut(uid)
            .ok_or_else(|| AuthError::invalid_state(format!("no identity with uid {uid}")))?;

        identity.custom_claims = claims;
        identity.updated_at = now;
        Ok(identity.clone())
    }

    async fn find_by_uid(&self, uid: &str) -> AuthResult<Option<InternalIdentity>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.identities.get(uid).cloned())
    }
}

//! In-process mirror of the registered-member set.
//!
//! Membership is checked on every inbound message and changes only when a
//! user runs `/register`, so the [`MembershipCache`] answers reads from a
//! `HashSet` behind a [`RwLock`] and writes through to the
//! [`MembershipStore`]. The store round-trip always happens outside the lock;
//! the write lock is held only for the local insert or swap.
//!
//! There is no empty constructor: a cache only exists after
//! [`MembershipCache::bootstrap`] has loaded the full set from the store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::store::{Member, MembershipStore, StoreError};

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The member was newly registered.
    Created(Member),
    /// The member was registered before this call.
    AlreadyRegistered,
}

/// Write-through cache of registered member ids.
pub struct MembershipCache {
    store: Arc<dyn MembershipStore>,
    registered: RwLock<HashSet<String>>,
}

impl std::fmt::Debug for MembershipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipCache").finish_non_exhaustive()
    }
}

impl MembershipCache {
    /// Load every registered id from `store` and build the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store listing fails.
    pub async fn bootstrap(store: Arc<dyn MembershipStore>) -> Result<Self, StoreError> {
        let ids = store.list_all().await?;
        let registered: HashSet<String> = ids.into_iter().collect();
        info!(count = registered.len(), "membership cache loaded");
        Ok(Self {
            store,
            registered: RwLock::new(registered),
        })
    }

    /// Reload the full set from the store and merge it in.
    ///
    /// Registration is never revoked, so ids already cached are kept even if
    /// the listing predates them (a `register` may finish while the listing
    /// is in flight). Returns the number of registered members afterwards.
    /// On failure the current contents are kept as they are.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store listing fails.
    pub async fn resync(&self) -> Result<usize, StoreError> {
        let ids = match self.store.list_all().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "membership resync failed; keeping cached set");
                return Err(err);
            }
        };
        let mut fresh: HashSet<String> = ids.into_iter().collect();
        let mut registered = self.registered.write().await;
        fresh.extend(registered.drain());
        let count = fresh.len();
        *registered = fresh;
        drop(registered);
        info!(count, "membership cache resynced");
        Ok(count)
    }

    /// Whether `member_id` is known to be registered. Never touches the store.
    pub async fn is_registered(&self, member_id: &str) -> bool {
        self.registered.read().await.contains(member_id)
    }

    /// Register `member_id`, writing through to the store.
    ///
    /// Cached members short-circuit to [`Registration::AlreadyRegistered`]
    /// without any I/O. A duplicate-key report from the store means another
    /// writer got there first and is also treated as already registered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store write fails. The
    /// cache is left unchanged in that case.
    pub async fn register(&self, member_id: &str) -> Result<Registration, StoreError> {
        if self.is_registered(member_id).await {
            debug!(member_id, "already registered (cached)");
            return Ok(Registration::AlreadyRegistered);
        }

        match self.store.insert(member_id).await {
            Ok(member) => {
                self.registered.write().await.insert(member_id.to_owned());
                info!(member_id, "member registered");
                Ok(Registration::Created(member))
            }
            Err(StoreError::DuplicateKey(_)) => {
                debug!(member_id, "already registered (store)");
                Ok(Registration::AlreadyRegistered)
            }
            Err(err) => {
                warn!(member_id, error = %err, "member registration failed");
                Err(err)
            }
        }
    }

    /// Snapshot of the registered ids, sorted.
    pub async fn list_registered(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registered.read().await.iter().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered members currently cached.
    pub async fn len(&self) -> usize {
        self.registered.read().await.len()
    }

    /// Whether no members are cached.
    pub async fn is_empty(&self) -> bool {
        self.registered.read().await.is_empty()
    }
}

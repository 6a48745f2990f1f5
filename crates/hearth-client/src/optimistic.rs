//! Optimistic mutations over any versioned cache.
//!
//! The flow is: snapshot the cached value, patch it with what the server is
//! expected to do, run the request, restore the snapshot if the request
//! fails, and mark the entry stale either way so the next refetch reconciles.
//!
//! A rollback only restores the snapshot while the entry still holds the
//! version this update wrote. If a later mutation patched the same entry in
//! the meantime, its speculative state is kept and the refetch decides.

use std::future::Future;
use std::hash::Hash;

use tracing::debug;

use crate::cache::QueryCache;

/// The cache operations the optimistic flow needs.
pub trait CacheStore<K, V> {
    /// Patch the cached value in one atomic step, returning the value it
    /// replaced and the version written. `None` when nothing is cached.
    fn patch_with<F>(&self, key: &K, transform: F) -> Option<(V, u64)>
    where
        F: FnOnce(&mut V);

    fn restore(&self, key: &K, version: u64, snapshot: V) -> bool;

    fn invalidate(&self, key: &K);
}

impl<K, V> CacheStore<K, V> for QueryCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn patch_with<F>(&self, key: &K, transform: F) -> Option<(V, u64)>
    where
        F: FnOnce(&mut V),
    {
        self.patch_capturing(key, transform)
    }

    fn restore(&self, key: &K, version: u64, snapshot: V) -> bool {
        self.restore_if_version(key, version, snapshot)
    }

    fn invalidate(&self, key: &K) {
        self.mark_stale(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The snapshot is back in place.
    Restored,
    /// A newer write owns the entry; it was left alone and marked stale.
    Superseded,
    /// Nothing was cached, so nothing was patched.
    NotCached,
}

/// A speculative write that must be settled with [`commit`] or
/// [`rollback`]. Dropping it unsettled rolls back.
///
/// [`commit`]: OptimisticUpdate::commit
/// [`rollback`]: OptimisticUpdate::rollback
pub struct OptimisticUpdate<'a, S, K, V>
where
    S: CacheStore<K, V>,
{
    store: &'a S,
    key: K,
    /// Prior value and the version this update wrote.
    written: Option<(V, u64)>,
    settled: bool,
}

impl<S, K, V> OptimisticUpdate<'_, S, K, V>
where
    S: CacheStore<K, V>,
{
    pub fn version(&self) -> Option<u64> {
        self.written.as_ref().map(|(_, version)| *version)
    }

    /// Keep the speculative value and mark the entry for refetch.
    pub fn commit(mut self) {
        self.settled = true;
        self.store.invalidate(&self.key);
    }

    pub fn rollback(mut self) -> RollbackOutcome {
        self.settle_rollback()
    }

    fn settle_rollback(&mut self) -> RollbackOutcome {
        self.settled = true;
        let outcome = match self.written.take() {
            Some((snapshot, version)) => {
                if self.store.restore(&self.key, version, snapshot) {
                    RollbackOutcome::Restored
                } else {
                    RollbackOutcome::Superseded
                }
            }
            None => RollbackOutcome::NotCached,
        };
        self.store.invalidate(&self.key);
        debug!(
            target = "hearth_client::optimistic",
            outcome = ?outcome,
            "optimistic update rolled back"
        );
        outcome
    }
}

impl<S, K, V> Drop for OptimisticUpdate<'_, S, K, V>
where
    S: CacheStore<K, V>,
{
    fn drop(&mut self) {
        if !self.settled {
            self.settle_rollback();
        }
    }
}

/// Apply `transform` to the cached value right away, keeping what it replaced.
pub fn apply_optimistic<'a, S, K, V, F>(
    store: &'a S,
    key: K,
    transform: F,
) -> OptimisticUpdate<'a, S, K, V>
where
    S: CacheStore<K, V>,
    F: FnOnce(&mut V),
{
    let written = store.patch_with(&key, transform);
    OptimisticUpdate {
        store,
        key,
        written,
        settled: false,
    }
}

/// Patch `key`, await `request`, then commit or roll back on its result.
pub async fn run_optimistic<S, K, V, F, Fut, T, E>(
    store: &S,
    key: K,
    transform: F,
    request: Fut,
) -> Result<T, E>
where
    S: CacheStore<K, V>,
    F: FnOnce(&mut V),
    Fut: Future<Output = Result<T, E>>,
{
    let update = apply_optimistic(store, key, transform);
    match request.await {
        Ok(value) => {
            update.commit();
            Ok(value)
        }
        Err(err) => {
            update.rollback();
            Err(err)
        }
    }
}

/// [`run_optimistic`] across several keys that the same request affects.
pub async fn run_optimistic_all<S, K, V, F, Fut, T, E>(
    store: &S,
    keys: impl IntoIterator<Item = K>,
    transform: F,
    request: Fut,
) -> Result<T, E>
where
    S: CacheStore<K, V>,
    F: Fn(&mut V),
    Fut: Future<Output = Result<T, E>>,
{
    let updates: Vec<_> = keys
        .into_iter()
        .map(|key| apply_optimistic(store, key, &transform))
        .collect();
    match request.await {
        Ok(value) => {
            updates.into_iter().for_each(OptimisticUpdate::commit);
            Ok(value)
        }
        Err(err) => {
            for update in updates {
                update.rollback();
            }
            Err(err)
        }
    }
}

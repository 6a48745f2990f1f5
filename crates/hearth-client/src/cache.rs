//! Versioned query cache.
//!
//! Every write (server data, speculative patch or rollback) stamps the entry
//! with a fresh version from one monotonic counter, so a caller holding the
//! version it wrote can tell whether anything touched the entry since.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hearth_api_types::{MyDataResponse, PostView, RelationshipView, UserView};
use lru::LruCache;
use uuid::Uuid;

use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "hearth_client::cache";

/// Logical identity of a cached server query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Feed,
    MyData,
    PendingPosts,
    User(Uuid),
    Relationship(Uuid),
}

impl QueryKey {
    /// Keys whose data is a post list (bare or inside `MyData`).
    pub const POST_LISTS: [QueryKey; 3] = [Self::Feed, Self::MyData, Self::PendingPosts];
}

/// Cached payload for a [`QueryKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Posts(Vec<PostView>),
    MyData(MyDataResponse),
    User(UserView),
    Relationship(RelationshipView),
}

impl QueryData {
    /// Post list carried by this payload, whichever shape it has.
    pub fn posts_mut(&mut self) -> Option<&mut Vec<PostView>> {
        match self {
            Self::Posts(posts) => Some(posts),
            Self::MyData(data) => Some(&mut data.posts),
            Self::User(_) | Self::Relationship(_) => None,
        }
    }

    pub fn posts(&self) -> Option<&[PostView]> {
        match self {
            Self::Posts(posts) => Some(posts),
            Self::MyData(data) => Some(&data.posts),
            Self::User(_) | Self::Relationship(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub version: u64,
    pub stale: bool,
    /// Last time the value came from the server.
    pub fetched_at: Option<Instant>,
}

pub struct QueryCache<K, V> {
    entries: RwLock<LruCache<K, CacheEntry<V>>>,
    versions: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            versions: AtomicU64::new(0),
        }
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, key: &K) -> Option<V> {
        rw_write(&self.entries, SOURCE, "get")
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Snapshot of the whole entry, without touching recency.
    pub fn entry(&self, key: &K) -> Option<CacheEntry<V>> {
        rw_read(&self.entries, SOURCE, "entry").peek(key).cloned()
    }

    /// Value only if it is not stale and was fetched within `max_age`.
    pub fn get_fresh(&self, key: &K, max_age: Duration) -> Option<V> {
        let mut entries = rw_write(&self.entries, SOURCE, "get_fresh");
        let entry = entries.get(key)?;
        let recent = entry
            .fetched_at
            .is_some_and(|fetched| fetched.elapsed() <= max_age);
        (!entry.stale && recent).then(|| entry.value.clone())
    }

    /// Store a value confirmed by the server; clears the stale flag.
    pub fn set(&self, key: K, value: V) -> u64 {
        let version = self.next_version();
        rw_write(&self.entries, SOURCE, "set").put(
            key,
            CacheEntry {
                value,
                version,
                stale: false,
                fetched_at: Some(Instant::now()),
            },
        );
        version
    }

    /// Apply a speculative change in place. Returns the new version, or
    /// `None` when nothing is cached under `key`.
    pub fn patch<F>(&self, key: &K, transform: F) -> Option<u64>
    where
        F: FnOnce(&mut V),
    {
        let mut entries = rw_write(&self.entries, SOURCE, "patch");
        let entry = entries.get_mut(key)?;
        transform(&mut entry.value);
        entry.version = self.next_version();
        Some(entry.version)
    }

    /// Like [`patch`](Self::patch), but also hands back the value as it was
    /// just before `transform` ran, read under the same write guard.
    pub fn patch_capturing<F>(&self, key: &K, transform: F) -> Option<(V, u64)>
    where
        F: FnOnce(&mut V),
    {
        let mut entries = rw_write(&self.entries, SOURCE, "patch_capturing");
        let entry = entries.get_mut(key)?;
        let before = entry.value.clone();
        transform(&mut entry.value);
        entry.version = self.next_version();
        Some((before, entry.version))
    }

    /// Put `snapshot` back only if the entry still carries `expected`.
    pub fn restore_if_version(&self, key: &K, expected: u64, snapshot: V) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "restore_if_version");
        match entries.get_mut(key) {
            Some(entry) if entry.version == expected => {
                entry.value = snapshot;
                entry.version = self.next_version();
                true
            }
            _ => false,
        }
    }

    pub fn mark_stale(&self, key: &K) -> bool {
        match rw_write(&self.entries, SOURCE, "mark_stale").get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_stale_where<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let mut entries = rw_write(&self.entries, SOURCE, "mark_stale_where");
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn stale_keys(&self) -> Vec<K> {
        rw_read(&self.entries, SOURCE, "stale_keys")
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        rw_write(&self.entries, SOURCE, "remove")
            .pop(key)
            .map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Tagged cache storage.
//!
//! One LRU holds both backend reads and rendered output. Every entry is annotated with its tags
//! (and rendered path) at insertion time and expires after its own lifetime.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::config::CacheConfig;
use super::index::TagIndex;
use super::keys::CacheKey;
use super::lock::lock_or_recover;
use super::tags::{CacheTag, PagePath};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl CacheError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// The invalidation surface consumed by revalidation.
///
/// Both calls are no-ops when nothing matches. Implementations report an unreachable backing
/// store through [`CacheError::Unavailable`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Drop every entry annotated with `tag`; returns how many were dropped.
    async fn invalidate_by_tag(&self, tag: &CacheTag) -> Result<usize, CacheError>;

    /// Drop cached output for one rendered route; returns how many entries were dropped.
    async fn invalidate_by_path(&self, path: &PagePath) -> Result<usize, CacheError>;
}

/// A rendered HTTP response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Json(Arc<Value>),
    Response(CachedResponse),
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

struct StoreState {
    entries: LruCache<CacheKey, Entry>,
    index: TagIndex,
    /// Bumped by every drop; a fill observed before the bump is stale.
    epoch: u64,
}

/// In-process tagged LRU store.
pub struct TaggedStore {
    enabled: bool,
    state: Mutex<StoreState>,
}

impl TaggedStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.is_enabled(),
            state: Mutex::new(StoreState {
                entries: LruCache::new(config.capacity_non_zero()),
                index: TagIndex::default(),
                epoch: 0,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a live entry. Expired entries are dropped and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }

        let mut state = lock_or_recover(&self.state, SOURCE, "get");
        let now = Instant::now();
        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.value.clone()));
        let live = match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                state.entries.pop(key);
                state.index.unregister(key);
                debug!(layer = key.layer(), "cache entry expired");
                None
            }
            None => None,
        };

        match live {
            Some(value) => {
                counter!("cache_hit_total", "layer" => key.layer()).increment(1);
                Some(value)
            }
            None => {
                counter!("cache_miss_total", "layer" => key.layer()).increment(1);
                None
            }
        }
    }

    /// Invalidation epoch to capture before fetching a value for [`TaggedStore::put_since`].
    pub fn epoch(&self) -> u64 {
        lock_or_recover(&self.state, SOURCE, "epoch").epoch
    }

    /// Store `value` under `key` for `ttl`, annotated with `tags` and an optional `path`.
    ///
    /// A zero `ttl` stores nothing.
    pub fn put(
        &self,
        key: CacheKey,
        value: CachedValue,
        tags: HashSet<CacheTag>,
        path: Option<PagePath>,
        ttl: Duration,
    ) {
        let epoch = self.epoch();
        self.put_since(epoch, key, value, tags, path, ttl);
    }

    /// Like [`TaggedStore::put`], for a value fetched at `observed`.
    ///
    /// Returns `false` without storing when an invalidation ran after `observed`, so a read that
    /// raced a revalidation cannot bring back what it dropped.
    pub fn put_since(
        &self,
        observed: u64,
        key: CacheKey,
        value: CachedValue,
        tags: HashSet<CacheTag>,
        path: Option<PagePath>,
        ttl: Duration,
    ) -> bool {
        if !self.enabled || ttl.is_zero() {
            return false;
        }

        let mut state = lock_or_recover(&self.state, SOURCE, "put");
        if state.epoch != observed {
            debug!(layer = key.layer(), "skipping fill that raced an invalidation");
            counter!("cache_stale_fill_skipped_total", "layer" => key.layer()).increment(1);
            return false;
        }
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };

        if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
            if evicted != key {
                state.index.unregister(&evicted);
                counter!("cache_evict_total", "layer" => evicted.layer()).increment(1);
            }
        }
        state.index.register(key, tags, path);
        true
    }

    /// Drop every entry tagged `tag`.
    pub fn drop_tag(&self, tag: &CacheTag) -> usize {
        let mut state = lock_or_recover(&self.state, SOURCE, "drop_tag");
        let keys = state.index.keys_for_tag(tag);
        Self::drop_keys(&mut state, keys)
    }

    /// Drop every entry rendered for `path`.
    pub fn drop_path(&self, path: &PagePath) -> usize {
        let mut state = lock_or_recover(&self.state, SOURCE, "drop_path");
        let keys = state.index.keys_for_path(path);
        Self::drop_keys(&mut state, keys)
    }

    fn drop_keys(state: &mut StoreState, keys: HashSet<CacheKey>) -> usize {
        state.epoch += 1;
        let mut dropped = 0;
        for key in keys {
            if state.entries.pop(&key).is_some() {
                dropped += 1;
            }
            state.index.unregister(&key);
        }
        dropped
    }

    pub fn tags_for(&self, key: &CacheKey) -> HashSet<CacheTag> {
        lock_or_recover(&self.state, SOURCE, "tags_for")
            .index
            .tags_for_key(key)
    }

    pub fn clear(&self) {
        let mut state = lock_or_recover(&self.state, SOURCE, "clear");
        state.epoch += 1;
        state.entries.clear();
        state.index.clear();
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for TaggedStore {
    async fn invalidate_by_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
        Ok(self.drop_tag(tag))
    }

    async fn invalidate_by_path(&self, path: &PagePath) -> Result<usize, CacheError> {
        Ok(self.drop_path(path))
    }
}

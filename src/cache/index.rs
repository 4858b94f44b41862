//! Bidirectional tag and path index.
//!
//! Tracks which cache keys carry which tags and which rendered path, so invalidation can find
//! every affected key and eviction can clean up after itself.

use std::collections::{HashMap, HashSet};

use super::keys::CacheKey;
use super::tags::{CacheTag, PagePath};

#[derive(Debug, Default)]
pub(crate) struct TagIndex {
    tag_to_keys: HashMap<CacheTag, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, HashSet<CacheTag>>,
    path_to_keys: HashMap<PagePath, HashSet<CacheKey>>,
    key_to_path: HashMap<CacheKey, PagePath>,
}

impl TagIndex {
    /// Annotate `key` with `tags` and, for rendered output, its `path`.
    ///
    /// Replaces any previous annotation of the same key.
    pub fn register(&mut self, key: CacheKey, tags: HashSet<CacheTag>, path: Option<PagePath>) {
        self.unregister(&key);

        for tag in &tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        if let Some(path) = path {
            self.path_to_keys
                .entry(path.clone())
                .or_default()
                .insert(key.clone());
            self.key_to_path.insert(key.clone(), path);
        }
        self.key_to_tags.insert(key, tags);
    }

    pub fn keys_for_tag(&self, tag: &CacheTag) -> HashSet<CacheKey> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    pub fn keys_for_path(&self, path: &PagePath) -> HashSet<CacheKey> {
        self.path_to_keys.get(path).cloned().unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &CacheKey) -> HashSet<CacheTag> {
        self.key_to_tags.get(key).cloned().unwrap_or_default()
    }

    /// Forget every mapping of `key`.
    pub fn unregister(&mut self, key: &CacheKey) {
        if let Some(tags) = self.key_to_tags.remove(key) {
            for tag in tags {
                if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tag_to_keys.remove(&tag);
                    }
                }
            }
        }
        if let Some(path) = self.key_to_path.remove(key) {
            if let Some(keys) = self.path_to_keys.get_mut(&path) {
                keys.remove(key);
                if keys.is_empty() {
                    self.path_to_keys.remove(&path);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
        self.path_to_keys.clear();
        self.key_to_path.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}

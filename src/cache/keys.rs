//! Cache key definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Identifies one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A backend read: collection plus a fingerprint of the query that produced it.
    Fetch {
        collection: &'static str,
        fingerprint: u64,
    },
    /// Rendered output for a route and query string.
    Page { path: String, query_hash: u64 },
}

impl CacheKey {
    pub fn fetch<T: Hash>(collection: &'static str, request: &T) -> Self {
        Self::Fetch {
            collection,
            fingerprint: hash_value(&(collection, request)),
        }
    }

    pub fn page(path: &str, query: &str) -> Self {
        Self::Page {
            path: path.to_string(),
            query_hash: hash_query(query),
        }
    }

    /// Metrics label for the layer this key lives in.
    pub fn layer(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Page { .. } => "page",
        }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a query string for page keys.
pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_keys_depend_on_collection_and_request() {
        let a = CacheKey::fetch("blogs", &("list", 1u32, "-created"));
        let b = CacheKey::fetch("blogs", &("list", 1u32, "-created"));
        let c = CacheKey::fetch("faqs", &("list", 1u32, "-created"));
        let d = CacheKey::fetch("blogs", &("list", 2u32, "-created"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn page_keys_distinguish_queries() {
        assert_eq!(CacheKey::page("/blog", "page=2"), CacheKey::page("/blog", "page=2"));
        assert_ne!(CacheKey::page("/blog", "page=1"), CacheKey::page("/blog", "page=2"));
        assert_eq!(CacheKey::page("/blog", "").layer(), "page");
    }
}

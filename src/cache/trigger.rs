//! Revalidation trigger.
//!
//! Issues invalidation calls against the cache store once a mutation has committed. Failures are
//! logged and reported in the outcome but never surface as errors to the caller: the cost of a
//! failed invalidation is stale output until the entry expires.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::planner::RevalidationPlan;
use super::store::{CacheError, CacheStore};
use super::tags::{CacheTag, PagePath};

const METRIC_REVALIDATION_MS: &str = "revalidation_ms";

/// What one revalidation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevalidationOutcome {
    /// Tags invalidated successfully.
    pub tags: Vec<CacheTag>,
    /// Paths invalidated successfully.
    pub paths: Vec<PagePath>,
    /// Targets whose invalidation failed.
    pub failed: Vec<String>,
    /// Entries dropped across all calls.
    pub dropped: usize,
    /// Caching is disabled; nothing was attempted.
    pub skipped: bool,
}

impl RevalidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RevalidationTrigger {
    store: Arc<dyn CacheStore>,
    enabled: bool,
}

impl RevalidationTrigger {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.is_enabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop every entry tagged `tag`. Matching nothing is not an error.
    pub async fn invalidate_by_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
        if !self.enabled {
            debug!(tag = %tag, "Tag invalidation skipped: cache disabled");
            return Ok(0);
        }

        match self.store.invalidate_by_tag(tag).await {
            Ok(dropped) => {
                counter!("cache_invalidation_total", "kind" => "tag").increment(1);
                debug!(tag = %tag, dropped, "Invalidated cache tag");
                Ok(dropped)
            }
            Err(err) => {
                counter!("cache_invalidation_failed_total", "kind" => "tag").increment(1);
                warn!(
                    tag = %tag,
                    error = %err,
                    "Tag invalidation failed; stale entries remain until they expire"
                );
                Err(err)
            }
        }
    }

    /// Drop cached output rendered for `path`. Matching nothing is not an error.
    pub async fn invalidate_by_path(&self, path: &PagePath) -> Result<usize, CacheError> {
        if !self.enabled {
            debug!(path = %path, "Path invalidation skipped: cache disabled");
            return Ok(0);
        }

        match self.store.invalidate_by_path(path).await {
            Ok(dropped) => {
                counter!("cache_invalidation_total", "kind" => "path").increment(1);
                debug!(path = %path, dropped, "Invalidated cached path");
                Ok(dropped)
            }
            Err(err) => {
                counter!("cache_invalidation_failed_total", "kind" => "path").increment(1);
                warn!(
                    path = %path,
                    error = %err,
                    "Path invalidation failed; stale output remains until it expires"
                );
                Err(err)
            }
        }
    }

    /// Invalidate each tag, then each path, of `plan`, exactly once.
    #[instrument(skip_all, fields(plan = %plan))]
    pub async fn apply(&self, plan: &RevalidationPlan) -> RevalidationOutcome {
        if !self.enabled {
            debug!("Revalidation skipped: cache disabled");
            return RevalidationOutcome {
                skipped: true,
                ..Default::default()
            };
        }

        let started_at = Instant::now();
        let mut outcome = RevalidationOutcome::default();

        for tag in plan.tags() {
            match self.invalidate_by_tag(tag).await {
                Ok(dropped) => {
                    outcome.dropped += dropped;
                    outcome.tags.push(tag.clone());
                }
                Err(_) => outcome.failed.push(format!("tag:{tag}")),
            }
        }
        for path in plan.paths() {
            match self.invalidate_by_path(path).await {
                Ok(dropped) => {
                    outcome.dropped += dropped;
                    outcome.paths.push(path.clone());
                }
                Err(_) => outcome.failed.push(format!("path:{path}")),
            }
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_REVALIDATION_MS).record(elapsed_ms);
        info!(
            tags = outcome.tags.len(),
            paths = outcome.paths.len(),
            failed = outcome.failed.len(),
            dropped = outcome.dropped,
            elapsed_ms,
            "Revalidation applied"
        );

        outcome
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Records every invalidation call; optionally fails them all.
    #[derive(Default)]
    pub struct RecordingStore {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingStore {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: String) -> Result<usize, CacheError> {
            self.calls.lock().expect("calls lock").push(call);
            if self.fail {
                Err(CacheError::unavailable("store offline"))
            } else {
                Ok(0)
            }
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn invalidate_by_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
            self.record(format!("tag:{tag}"))
        }

        async fn invalidate_by_path(&self, path: &PagePath) -> Result<usize, CacheError> {
            self.record(format!("path:{path}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingStore;
    use super::*;
    use crate::cache::registry::TagRegistry;
    use crate::domain::content::ContentDomain;

    fn trigger_with(store: Arc<RecordingStore>, config: &CacheConfig) -> RevalidationTrigger {
        RevalidationTrigger::new(store, config)
    }

    #[tokio::test]
    async fn apply_calls_each_target_once() {
        let store = Arc::new(RecordingStore::default());
        let trigger = trigger_with(store.clone(), &CacheConfig::default());
        let registry = TagRegistry::default();
        let plan = RevalidationPlan::for_domains(&registry, [ContentDomain::ContactOptions]);

        let outcome = trigger.apply(&plan).await;

        assert!(outcome.is_clean());
        assert_eq!(store.calls(), vec!["tag:contact-options", "path:/contact"]);
        assert_eq!(outcome.tags.len(), 1);
        assert_eq!(outcome.paths.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let store = Arc::new(RecordingStore::failing());
        let trigger = trigger_with(store.clone(), &CacheConfig::default());
        let registry = TagRegistry::default();
        let plan = RevalidationPlan::for_domains(&registry, [ContentDomain::Faqs]);

        let outcome = trigger.apply(&plan).await;

        assert!(!outcome.is_clean());
        assert_eq!(
            outcome.failed,
            vec!["tag:faqs", "path:/resources", "path:/pricing"]
        );
        assert!(outcome.tags.is_empty());
    }

    #[tokio::test]
    async fn disabled_trigger_skips_store() {
        let store = Arc::new(RecordingStore::default());
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let trigger = trigger_with(store.clone(), &config);
        let registry = TagRegistry::default();

        let outcome = trigger
            .apply(&RevalidationPlan::everything(&registry))
            .await;

        assert!(outcome.skipped);
        assert!(store.calls().is_empty());
        let tag = registry.tag(ContentDomain::Blogs);
        assert_eq!(trigger.invalidate_by_tag(tag).await.ok(), Some(0));
    }
}

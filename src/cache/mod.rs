//! Tagged caching and revalidation.
//!
//! Content reads and rendered pages share one tagged store:
//!
//! - **Reads** are cached per collection and query, tagged from the [`TagRegistry`].
//! - **Pages** are cached per route, tagged with every tag their reads recorded.
//!
//! After a mutation commits, a [`RevalidationPlan`] built from the registry is handed to the
//! [`RevalidationTrigger`], which invalidates the plan's tags and paths.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! short_secs = 300
//! ```

mod config;
pub mod deps;
mod events;
mod index;
mod keys;
mod lock;
mod middleware;
mod planner;
mod registry;
mod store;
mod tags;
mod trigger;

pub use config::{CacheConfig, DurationTiers};
pub use events::{MutationAction, MutationEvent};
pub use keys::{CacheKey, hash_query, hash_value};
pub use middleware::{PageCacheState, page_cache_layer};
pub use planner::RevalidationPlan;
pub use registry::{DomainEntry, RefreshFrequency, TagRegistry};
pub use store::{CacheError, CacheStore, CachedResponse, CachedValue, TaggedStore};
pub use tags::{CacheTag, Freshness, PagePath, TagError};
pub use trigger::{RevalidationOutcome, RevalidationTrigger};

#[cfg(test)]
pub(crate) use trigger::testing;

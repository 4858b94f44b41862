//! Cache configuration.
//!
//! Controls the tagged store and the duration tiers attached to content reads, via the `[cache]`
//! table of `finwage.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_STATIC_SECS: u64 = 604_800;
const DEFAULT_LONG_SECS: u64 = 86_400;
const DEFAULT_MEDIUM_SECS: u64 = 3_600;
const DEFAULT_SHORT_SECS: u64 = 300;

/// Cache configuration from `finwage.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve reads and rendered output from the tagged store.
    pub enabled: bool,
    /// Maximum entries kept before LRU eviction.
    pub capacity: usize,
    pub durations: DurationTiers,
}

/// Seconds each freshness tier keeps an entry alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DurationTiers {
    pub static_secs: u64,
    pub long_secs: u64,
    pub medium_secs: u64,
    pub short_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            durations: DurationTiers::default(),
        }
    }
}

impl Default for DurationTiers {
    fn default() -> Self {
        Self {
            static_secs: DEFAULT_STATIC_SECS,
            long_secs: DEFAULT_LONG_SECS,
            medium_secs: DEFAULT_MEDIUM_SECS,
            short_secs: DEFAULT_SHORT_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            durations: DurationTiers {
                static_secs: settings.static_secs,
                long_secs: settings.long_secs,
                medium_secs: settings.medium_secs,
                short_secs: settings.short_secs,
            },
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

impl DurationTiers {
    pub fn static_ttl(&self) -> Duration {
        Duration::from_secs(self.static_secs)
    }

    pub fn long_ttl(&self) -> Duration {
        Duration::from_secs(self.long_secs)
    }

    pub fn medium_ttl(&self) -> Duration {
        Duration::from_secs(self.medium_secs)
    }

    pub fn short_ttl(&self) -> Duration {
        Duration::from_secs(self.short_secs)
    }
}

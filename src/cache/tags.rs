//! Tag and path identifiers used to group cache entries.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::config::DurationTiers;

const MAX_TAG_LEN: usize = 128;
const MAX_PATH_LEN: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("cache tag must not be empty")]
    EmptyTag,
    #[error("cache tag `{0}` contains characters outside [a-z0-9_:=-] or is too long")]
    MalformedTag(String),
    #[error("path `{0}` must start with `/` and contain no query or fragment")]
    MalformedPath(String),
}

/// An opaque string grouping cache entries for bulk invalidation.
///
/// Domain tags come from the registry; anything arriving from outside goes through
/// [`CacheTag::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheTag(String);

impl CacheTag {
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// `{stem}-{qualifier}`, with the qualifier folded into tag characters.
    /// `{stem}{separator}{qualifier}`, with the qualifier folded to tag characters.
    ///
    /// Domain tags never contain `:` or `=`, so a qualified tag cannot collide with one.
    pub(crate) fn qualified(stem: &str, separator: char, qualifier: &str) -> Self {
        let mut value = String::with_capacity(stem.len() + qualifier.len() + 1);
        value.push_str(stem);
        value.push(separator);
        for ch in qualifier.trim().chars() {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                value.push(ch.to_ascii_lowercase());
            } else {
                value.push('-');
            }
        }
        value.truncate(MAX_TAG_LEN);
        Self(value)
    }

    pub fn parse(value: &str) -> Result<Self, TagError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TagError::EmptyTag);
        }
        let well_formed = value.len() <= MAX_TAG_LEN
            && value
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || "-_:=".contains(ch));
        if !well_formed {
            return Err(TagError::MalformedTag(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rendered route, normalized without a trailing slash (except the root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PagePath(String);

impl PagePath {
    pub fn parse(value: &str) -> Result<Self, TagError> {
        let trimmed = value.trim();
        if !trimmed.starts_with('/')
            || trimmed.len() > MAX_PATH_LEN
            || trimmed.contains(['?', '#'])
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(TagError::MalformedPath(value.to_string()));
        }
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            rest => rest,
        };
        Ok(Self(normalized.to_string()))
    }

    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long a read stays fresh before it is fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    Static,
    Long,
    Medium,
    Short,
    /// Never cached.
    Dynamic,
}

impl Freshness {
    pub fn ttl(self, tiers: &DurationTiers) -> Duration {
        match self {
            Self::Static => tiers.static_ttl(),
            Self::Long => tiers.long_ttl(),
            Self::Medium => tiers.medium_ttl(),
            Self::Short => tiers.short_ttl(),
            Self::Dynamic => Duration::ZERO,
        }
    }
}

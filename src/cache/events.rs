//! Mutation events.
//!
//! An event is produced after a write commits and lives only for the request that produced it.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::content::ContentDomain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" | "created" => Ok(Self::Create),
            "update" | "updated" => Ok(Self::Update),
            "delete" | "deleted" => Ok(Self::Delete),
            other => Err(format!("unknown mutation action `{other}`")),
        }
    }
}

/// A committed change to one record of a content domain.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Correlates log lines of one revalidation.
    pub id: Uuid,
    pub domain: ContentDomain,
    pub action: MutationAction,
    pub record_id: Option<String>,
    pub slug: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    pub fn new(domain: ContentDomain, action: MutationAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain,
            action,
            record_id: None,
            slug: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_record(mut self, record_id: Option<String>, slug: Option<String>) -> Self {
        self.record_id = record_id.filter(|id| !id.trim().is_empty());
        self.slug = slug.filter(|slug| !slug.trim().is_empty());
        self
    }
}

//! Record store traits describing backend adapters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::records::{Record, RecordPage};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("record store unavailable: {reason}")]
    SourceUnavailable { reason: String },
    #[error("record not found in `{collection}`")]
    NotFound { collection: String },
    #[error("record store rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode record store response: {0}")]
    Decode(String),
    #[error("record store authentication failed: {0}")]
    Auth(String),
}

impl BackendError {
    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::SourceUnavailable {
            reason: reason.to_string(),
        }
    }

    pub fn not_found(collection: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

/// Listing parameters forwarded verbatim to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListOptions {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub fields: Option<String>,
    pub expand: Option<String>,
}

impl ListOptions {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Fill unset values from `defaults`.
    pub fn or(self, defaults: ListOptions) -> Self {
        Self {
            page: self.page.or(defaults.page),
            per_page: self.per_page.or(defaults.per_page),
            sort: self.sort.or(defaults.sort),
            filter: self.filter.or(defaults.filter),
            fields: self.fields.or(defaults.fields),
            expand: self.expand.or(defaults.expand),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, collection: &str, options: &ListOptions)
    -> Result<RecordPage, BackendError>;

    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Record, BackendError>;

    async fn create(&self, collection: &str, body: &Value) -> Result<Record, BackendError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError>;
}

/// One access rule of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::List,
        RuleKind::View,
        RuleKind::Create,
        RuleKind::Update,
        RuleKind::Delete,
    ];

    /// Field name on the collection schema.
    pub fn field(self) -> &'static str {
        match self {
            Self::List => "listRule",
            Self::View => "viewRule",
            Self::Create => "createRule",
            Self::Update => "updateRule",
            Self::Delete => "deleteRule",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.field() == value)
            .ok_or_else(|| format!("unknown rule `{value}`"))
    }
}

/// Rule values keyed by rule; `None` restricts the action to superusers.
pub type RuleSet = BTreeMap<RuleKind, Option<String>>;

#[async_trait]
pub trait CollectionRules: Send + Sync {
    async fn rules(&self, collection: &str) -> Result<RuleSet, BackendError>;

    /// Overwrite only the rules present in `rules`.
    async fn update_rules(&self, collection: &str, rules: &RuleSet) -> Result<(), BackendError>;
}

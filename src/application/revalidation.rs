//! Revalidation entry points shared by the HTTP handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cache::{
    CacheTag, MutationAction, MutationEvent, PagePath, RefreshFrequency, RevalidationOutcome,
    RevalidationPlan, RevalidationTrigger, TagError, TagRegistry,
};
use crate::domain::content::ContentDomain;

#[derive(Debug, Error)]
pub enum RevalidationError {
    #[error("invalid cache tag `{value}`")]
    InvalidTag {
        value: String,
        #[source]
        source: TagError,
    },
    #[error("invalid path `{value}`")]
    InvalidPath {
        value: String,
        #[source]
        source: TagError,
    },
    #[error("{0}")]
    InvalidAction(String),
    #[error("{0}")]
    InvalidFrequency(String),
    #[error("at least one {0} is required")]
    Empty(&'static str),
}

#[derive(Debug, Clone)]
pub struct RevalidationReport {
    /// Resolved domain for collection requests; `None` when the collection is unknown.
    pub domain: Option<ContentDomain>,
    pub plan: RevalidationPlan,
    pub outcome: RevalidationOutcome,
    pub elapsed: Duration,
}

impl RevalidationReport {
    pub fn tag_names(&self) -> Vec<String> {
        self.plan.tags().iter().map(ToString::to_string).collect()
    }

    pub fn path_names(&self) -> Vec<String> {
        self.plan.paths().iter().map(ToString::to_string).collect()
    }

    pub fn elapsed_label(&self) -> String {
        format!("{}ms", self.elapsed.as_millis())
    }
}

pub struct RevalidationService {
    registry: Arc<TagRegistry>,
    trigger: Arc<RevalidationTrigger>,
}

impl RevalidationService {
    pub fn new(registry: Arc<TagRegistry>, trigger: Arc<RevalidationTrigger>) -> Self {
        Self { registry, trigger }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Revalidate after a change to `collection`. Unknown collections are a logged no-op.
    #[instrument(skip_all, fields(collection = %collection))]
    pub async fn collection(
        &self,
        collection: &str,
        action: Option<&str>,
        record_id: Option<String>,
        slug: Option<String>,
    ) -> Result<RevalidationReport, RevalidationError> {
        let action = match action {
            Some(value) => value
                .parse::<MutationAction>()
                .map_err(RevalidationError::InvalidAction)?,
            None => MutationAction::Update,
        };

        let Some(domain) = ContentDomain::from_collection(collection) else {
            warn!(action = %action, "No cache mapping for collection; nothing revalidated");
            return Ok(RevalidationReport {
                domain: None,
                plan: RevalidationPlan::default(),
                outcome: RevalidationOutcome::default(),
                elapsed: Duration::ZERO,
            });
        };

        let event = MutationEvent::new(domain, action).with_record(record_id, slug);
        info!(
            event = %event.id,
            occurred_at = %event.timestamp,
            domain = %domain,
            action = %action,
            record = event.record_id.as_deref().unwrap_or("-"),
            "Revalidating collection"
        );
        let plan = RevalidationPlan::for_event(&self.registry, &event);
        Ok(self.run(Some(domain), plan).await)
    }

    #[instrument(skip_all, fields(count = tags.len()))]
    pub async fn tags(&self, tags: &[String]) -> Result<RevalidationReport, RevalidationError> {
        if tags.is_empty() {
            return Err(RevalidationError::Empty("tag"));
        }
        let tags = tags
            .iter()
            .map(|value| {
                CacheTag::parse(value).map_err(|source| RevalidationError::InvalidTag {
                    value: value.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for tag in &tags {
            if self.registry.owner_of(tag).is_none() {
                warn!(tag = %tag, "Revalidating a tag that no domain owns");
            }
        }

        Ok(self.run(None, RevalidationPlan::from_parts(tags, [])).await)
    }

    #[instrument(skip_all, fields(count = paths.len()))]
    pub async fn paths(&self, paths: &[String]) -> Result<RevalidationReport, RevalidationError> {
        if paths.is_empty() {
            return Err(RevalidationError::Empty("path"));
        }
        let paths = paths
            .iter()
            .map(|value| {
                PagePath::parse(value).map_err(|source| RevalidationError::InvalidPath {
                    value: value.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.run(None, RevalidationPlan::from_parts([], paths)).await)
    }

    pub async fn all(&self) -> RevalidationReport {
        warn!("Revalidating every cached domain and route");
        self.run(None, RevalidationPlan::everything(&self.registry))
            .await
    }

    #[instrument(skip_all, fields(frequency = %frequency))]
    pub async fn frequency(&self, frequency: RefreshFrequency) -> RevalidationReport {
        self.run(None, RevalidationPlan::for_frequency(&self.registry, frequency))
            .await
    }

    /// Parse a frequency as sent by a scheduler.
    pub fn parse_frequency(value: &str) -> Result<RefreshFrequency, RevalidationError> {
        value
            .trim()
            .parse()
            .map_err(RevalidationError::InvalidFrequency)
    }

    async fn run(&self, domain: Option<ContentDomain>, plan: RevalidationPlan) -> RevalidationReport {
        let started_at = Instant::now();
        let outcome = self.trigger.apply(&plan).await;
        RevalidationReport {
            domain,
            plan,
            outcome,
            elapsed: started_at.elapsed(),
        }
    }
}

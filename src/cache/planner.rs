//! Revalidation plans.
//!
//! A plan is the ordered, de-duplicated set of tags and paths one revalidation will invalidate.
//! Every plan is derived from the [`TagRegistry`], never from literal tag strings.

use std::fmt;

use crate::domain::content::ContentDomain;

use super::events::MutationEvent;
use super::registry::{RefreshFrequency, TagRegistry};
use super::tags::{CacheTag, PagePath};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevalidationPlan {
    tags: Vec<CacheTag>,
    paths: Vec<PagePath>,
}

impl RevalidationPlan {
    /// Tags and paths affected by a committed mutation.
    ///
    /// Covers the domain tag, related domain tags, the record tag, the domain's rendered paths and
    /// the record's own detail path.
    pub fn for_event(registry: &TagRegistry, event: &MutationEvent) -> Self {
        let mut plan = Self::for_domains(registry, [event.domain]);
        let entry = registry.entry(event.domain);

        for related in &entry.related {
            plan.add_tag(registry.tag(*related).clone());
        }
        if let Some(slug) = event.slug.as_deref() {
            plan.add_tag(registry.record_tag(event.domain, slug));
            if let Some(path) = registry.record_path(event.domain, slug) {
                plan.add_path(path);
            }
        }
        if let Some(id) = event.record_id.as_deref() {
            plan.add_tag(registry.record_tag(event.domain, id));
        }

        plan
    }

    /// Domain tags and rendered paths for each of `domains`.
    pub fn for_domains(
        registry: &TagRegistry,
        domains: impl IntoIterator<Item = ContentDomain>,
    ) -> Self {
        let mut plan = Self::default();
        for domain in domains {
            plan.add_tag(registry.tag(domain).clone());
            for path in registry.paths(domain) {
                plan.add_path(path.clone());
            }
        }
        plan
    }

    /// Domain tags refreshed on a schedule. Paths are left to the tags they depend on.
    pub fn for_frequency(registry: &TagRegistry, frequency: RefreshFrequency) -> Self {
        let mut plan = Self::default();
        for domain in frequency.domains() {
            plan.add_tag(registry.tag(*domain).clone());
        }
        plan
    }

    /// Every domain tag and every site route.
    pub fn everything(registry: &TagRegistry) -> Self {
        let mut plan = Self::default();
        for entry in registry.entries() {
            plan.add_tag(entry.tag.clone());
        }
        for path in registry.site_paths() {
            plan.add_path(path.clone());
        }
        plan
    }

    pub fn from_parts(
        tags: impl IntoIterator<Item = CacheTag>,
        paths: impl IntoIterator<Item = PagePath>,
    ) -> Self {
        let mut plan = Self::default();
        tags.into_iter().for_each(|tag| plan.add_tag(tag));
        paths.into_iter().for_each(|path| plan.add_path(path));
        plan
    }

    pub fn add_tag(&mut self, tag: CacheTag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn add_path(&mut self, path: PagePath) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn merge(&mut self, other: RevalidationPlan) {
        other.tags.into_iter().for_each(|tag| self.add_tag(tag));
        other.paths.into_iter().for_each(|path| self.add_path(path));
    }

    pub fn tags(&self) -> &[CacheTag] {
        &self.tags
    }

    pub fn paths(&self) -> &[PagePath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.paths.is_empty()
    }
}

impl fmt::Display for RevalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RevalidationPlan {{ tags: {}, paths: {} }}",
            self.tags.len(),
            self.paths.len()
        )
    }
}

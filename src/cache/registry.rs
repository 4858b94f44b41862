//! Cache tag registry.
//!
//! The single source of the domain → tag, domain → path and domain → freshness mappings. Built
//! once at startup and shared by `Arc` between content reads, which tag new entries, and every
//! revalidation path, which invalidates them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::content::ContentDomain;

use super::config::DurationTiers;
use super::tags::{CacheTag, Freshness, PagePath};

/// Routes whose output is rebuilt when everything is revalidated.
const SITE_PATHS: [&str; 11] = [
    "/",
    "/blog",
    "/pricing",
    "/careers",
    "/contact",
    "/about",
    "/resources",
    "/for-employees",
    "/for-employers",
    "/how-it-works",
    "/compliance",
];

struct Descriptor {
    tag: &'static str,
    record_stem: &'static str,
    paths: &'static [&'static str],
    related: &'static [ContentDomain],
    freshness: Freshness,
}

fn descriptor(domain: ContentDomain) -> Descriptor {
    use ContentDomain as D;
    use Freshness as F;

    match domain {
        D::Blogs => d("blogs", "blog", &["/blog", "/"], &[D::Authors, D::Categories], F::Short),
        D::Authors => d("authors", "author", &["/blog"], &[D::Blogs], F::Long),
        D::Categories => d("categories", "category", &["/blog"], &[D::Blogs], F::Long),
        D::Testimonials => d("testimonials", "testimonial", &["/"], &[], F::Long),
        D::Partners => d("partners", "partner", &["/"], &[], F::Long),
        D::Press => d("press", "press", &["/resources"], &[], F::Short),
        D::Features => d("features", "feature", &["/"], &[], F::Long),
        D::Integrations => d(
            "integrations",
            "integration",
            &["/", "/for-employers"],
            &[],
            F::Long,
        ),
        D::PricingPlans => d("pricing", "plan", &["/pricing", "/"], &[], F::Long),
        D::Leadership => d("leadership", "leader", &["/about"], &[], F::Static),
        D::Values => d("values", "value", &["/about", "/careers"], &[], F::Static),
        D::Milestones => d("milestones", "milestone", &["/about"], &[], F::Static),
        D::CompanyStats => d("stats", "stat", &["/about", "/"], &[], F::Medium),
        D::Jobs => d("jobs", "job", &["/careers"], &[], F::Short),
        D::EmployeeBenefits => d(
            "employee-benefits",
            "employee-benefit",
            &["/careers", "/for-employers", "/how-it-works"],
            &[],
            F::Long,
        ),
        D::Locations => d(
            "locations",
            "location",
            &["/careers", "/contact"],
            &[],
            F::Static,
        ),
        D::Support => d("support", "support", &["/resources", "/contact"], &[], F::Long),
        D::FaqTopics => d(
            "faq-topics",
            "faq-topic",
            &["/resources", "/pricing"],
            &[D::Faqs],
            F::Long,
        ),
        D::Faqs => d(
            "faqs",
            "faq",
            &["/resources", "/pricing"],
            &[D::FaqTopics],
            F::Long,
        ),
        D::ContactOptions => d("contact-options", "contact-option", &["/contact"], &[], F::Long),
        D::Enquiries => d(
            "enquiries",
            "enquiry",
            &["/contact"],
            &[D::ContactOptions],
            F::Short,
        ),
        D::Compliance => d("compliance", "compliance", &["/compliance"], &[], F::Long),
        D::SecurityFeatures => d("security", "security", &["/compliance"], &[], F::Long),
        D::ProcessSteps => d("process-steps", "process-step", &["/how-it-works"], &[], F::Long),
        D::EmployerStats => d(
            "employer-stats",
            "employer-stat",
            &["/for-employers"],
            &[],
            F::Medium,
        ),
        D::CtaCards => d("cta-cards", "cta-card", &["/"], &[], F::Long),
        D::ResourceArticles => d(
            "resource-articles",
            "resource-article",
            &["/resources"],
            &[],
            F::Short,
        ),
    }
}

fn d(
    tag: &'static str,
    record_stem: &'static str,
    paths: &'static [&'static str],
    related: &'static [ContentDomain],
    freshness: Freshness,
) -> Descriptor {
    Descriptor {
        tag,
        record_stem,
        paths,
        related,
        freshness,
    }
}

/// Scheduled refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshFrequency {
    Hourly,
    Daily,
    Weekly,
}

impl RefreshFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// Domains whose content changes at roughly this cadence.
    pub fn domains(self) -> &'static [ContentDomain] {
        use ContentDomain as D;
        match self {
            Self::Hourly => &[D::Blogs, D::Jobs, D::Press, D::CompanyStats],
            Self::Daily => &[D::PricingPlans, D::Testimonials, D::Features, D::Integrations],
            Self::Weekly => &[
                D::Leadership,
                D::Values,
                D::Milestones,
                D::Partners,
                D::Locations,
            ],
        }
    }
}

impl fmt::Display for RefreshFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshFrequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!(
                "invalid frequency `{other}`; expected hourly, daily or weekly"
            )),
        }
    }
}

/// Resolved cache facts for one domain.
#[derive(Debug, Clone)]
pub struct DomainEntry {
    pub domain: ContentDomain,
    pub tag: CacheTag,
    pub paths: Vec<PagePath>,
    pub related: Vec<ContentDomain>,
    pub freshness: Freshness,
    record_stem: &'static str,
}

/// Immutable domain → tag/path/duration table.
#[derive(Debug, Clone)]
pub struct TagRegistry {
    entries: Vec<DomainEntry>,
    durations: DurationTiers,
    site_paths: Vec<PagePath>,
}

impl TagRegistry {
    pub fn new(durations: DurationTiers) -> Self {
        let entries = ContentDomain::ALL
            .into_iter()
            .map(|domain| {
                let descriptor = descriptor(domain);
                DomainEntry {
                    domain,
                    tag: CacheTag::from_static(descriptor.tag),
                    paths: descriptor
                        .paths
                        .iter()
                        .copied()
                        .map(PagePath::from_static)
                        .collect(),
                    related: descriptor.related.to_vec(),
                    freshness: descriptor.freshness,
                    record_stem: descriptor.record_stem,
                }
            })
            .collect();

        Self {
            entries,
            durations,
            site_paths: SITE_PATHS.into_iter().map(PagePath::from_static).collect(),
        }
    }

    pub fn entry(&self, domain: ContentDomain) -> &DomainEntry {
        // `entries` is built from `ContentDomain::ALL` in declaration order.
        &self.entries[domain_index(domain)]
    }

    pub fn entries(&self) -> impl Iterator<Item = &DomainEntry> {
        self.entries.iter()
    }

    pub fn tag(&self, domain: ContentDomain) -> &CacheTag {
        &self.entry(domain).tag
    }

    pub fn paths(&self, domain: ContentDomain) -> &[PagePath] {
        &self.entry(domain).paths
    }

    pub fn durations(&self) -> &DurationTiers {
        &self.durations
    }

    /// Default lifetime of reads in `domain`.
    pub fn ttl(&self, domain: ContentDomain) -> Duration {
        self.entry(domain).freshness.ttl(&self.durations)
    }

    /// Tag for a single record, e.g. `blog:{slug}`.
    pub fn record_tag(&self, domain: ContentDomain, key: &str) -> CacheTag {
        CacheTag::qualified(self.entry(domain).record_stem, ':', key)
    }

    /// Tag for featured subsets, e.g. `featured=blogs`.
    pub fn featured_tag(&self, domain: ContentDomain) -> CacheTag {
        CacheTag::qualified("featured", '=', self.tag(domain).as_str())
    }

    /// Tag for a subset narrowed by category, department or city, e.g. `jobs=engineering`.
    pub fn facet_tag(&self, domain: ContentDomain, facet: &str) -> CacheTag {
        CacheTag::qualified(self.tag(domain).as_str(), '=', facet)
    }

    /// Tag for the pricing plan flagged as popular.
    pub fn popular_plan_tag(&self) -> CacheTag {
        self.facet_tag(ContentDomain::PricingPlans, "popular")
    }

    /// Detail route rendered for a single record, where the site has one.
    pub fn record_path(&self, domain: ContentDomain, slug: &str) -> Option<PagePath> {
        match domain {
            ContentDomain::Blogs => PagePath::parse(&format!("/blog/{slug}")).ok(),
            _ => None,
        }
    }

    pub fn site_paths(&self) -> &[PagePath] {
        &self.site_paths
    }

    /// Domain owning `tag`, if it is a domain tag.
    pub fn owner_of(&self, tag: &CacheTag) -> Option<ContentDomain> {
        self.entries
            .iter()
            .find(|entry| &entry.tag == tag)
            .map(|entry| entry.domain)
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new(DurationTiers::default())
    }
}

fn domain_index(domain: ContentDomain) -> usize {
    domain as usize
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_domain_has_a_unique_tag() {
        let registry = TagRegistry::default();
        let tags: HashSet<_> = registry.entries().map(|entry| entry.tag.clone()).collect();
        assert_eq!(tags.len(), ContentDomain::ALL.len());
    }

    #[test]
    fn derived_tags_never_shadow_domain_tags() {
        let registry = TagRegistry::default();
        let faq_topics = registry.tag(ContentDomain::FaqTopics).clone();
        assert_ne!(registry.record_tag(ContentDomain::Faqs, "topics"), faq_topics);

        for domain in ContentDomain::ALL {
            let derived = [
                registry.record_tag(domain, "topics"),
                registry.featured_tag(domain),
                registry.facet_tag(domain, "topics"),
            ];
            for tag in &derived {
                assert_eq!(registry.owner_of(tag), None, "{tag} shadows a domain tag");
            }
            assert_ne!(derived[0], derived[2]);
        }
    }

    #[test]
    fn entries_are_indexed_by_domain() {
        let registry = TagRegistry::default();
        for domain in ContentDomain::ALL {
            assert_eq!(registry.entry(domain).domain, domain);
        }
    }

    #[test]
    fn registry_tags_round_trip_through_parse() {
        let registry = TagRegistry::default();
        for entry in registry.entries() {
            let parsed = CacheTag::parse(entry.tag.as_str()).expect("registry tags are well formed");
            assert_eq!(registry.owner_of(&parsed), Some(entry.domain));
        }
    }

    #[test]
    fn contact_options_tag_and_path() {
        let registry = TagRegistry::default();
        assert_eq!(registry.tag(ContentDomain::ContactOptions).as_str(), "contact-options");
        assert_eq!(
            registry
                .paths(ContentDomain::ContactOptions)
                .iter()
                .map(PagePath::as_str)
                .collect::<Vec<_>>(),
            vec!["/contact"]
        );
    }

    #[test]
    fn derived_tags() {
        let registry = TagRegistry::default();
        assert_eq!(registry.record_tag(ContentDomain::Blogs, "ewa-101").as_str(), "blog:ewa-101");
        assert_eq!(registry.featured_tag(ContentDomain::Blogs).as_str(), "featured=blogs");
        assert_eq!(
            registry.facet_tag(ContentDomain::Jobs, "Engineering").as_str(),
            "jobs=engineering"
        );
        assert_eq!(registry.popular_plan_tag().as_str(), "pricing=popular");
        assert_eq!(
            registry
                .record_path(ContentDomain::Blogs, "ewa-101")
                .map(|path| path.to_string()),
            Some("/blog/ewa-101".to_string())
        );
        assert_eq!(registry.record_path(ContentDomain::Jobs, "x"), None);
    }

    #[test]
    fn ttl_follows_configured_tiers() {
        let registry = TagRegistry::new(DurationTiers {
            short_secs: 10,
            ..DurationTiers::default()
        });
        assert_eq!(registry.ttl(ContentDomain::Blogs), Duration::from_secs(10));
        assert_eq!(registry.ttl(ContentDomain::Leadership), Duration::from_secs(604_800));
    }

    #[test]
    fn frequency_parsing() {
        assert_eq!("daily".parse::<RefreshFrequency>(), Ok(RefreshFrequency::Daily));
        assert!("monthly".parse::<RefreshFrequency>().is_err());
        assert!(RefreshFrequency::Hourly.domains().contains(&ContentDomain::Blogs));
    }
}

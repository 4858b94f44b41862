//! Content reads.
//!
//! Every read attaches its domain's registry tag and lifetime to the cache entry it creates, and
//! records the same tags for the page cache. Backend failures surface as typed errors; there is no
//! retry and no stale fallback once an entry has expired.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::repos::{BackendError, ListOptions, RecordStore};
use crate::cache::{
    CacheKey, CacheTag, CachedValue, Freshness, TagRegistry, TaggedStore, deps,
};
use crate::domain::content::ContentDomain;
use crate::domain::error::DomainError;
use crate::domain::records::{Record, RecordPage};

const MAX_KEY_LEN: usize = 128;
const MAX_FACET_LEN: usize = 64;
const MAX_FILTER_LEN: usize = 512;
const MAX_PER_PAGE: u32 = 200;
const FULL_LIST_PER_PAGE: u32 = 200;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{domain} source unavailable")]
    SourceUnavailable {
        domain: ContentDomain,
        #[source]
        source: BackendError,
    },
    #[error("{domain} record `{key}` not found")]
    NotFound { domain: ContentDomain, key: String },
    #[error("{domain} read failed")]
    Backend {
        domain: ContentDomain,
        #[source]
        source: BackendError,
    },
}

impl ContentError {
    fn from_backend(domain: ContentDomain, key: Option<&str>, source: BackendError) -> Self {
        match source {
            BackendError::SourceUnavailable { .. } => Self::SourceUnavailable { domain, source },
            BackendError::NotFound { .. } => Self::NotFound {
                domain,
                key: key.unwrap_or_default().to_string(),
            },
            source => Self::Backend { domain, source },
        }
    }
}

/// Cache annotation for one read: `{ revalidate, tags }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub revalidate: Duration,
    pub tags: Vec<CacheTag>,
}

impl CacheOptions {
    /// The domain's registry tag and default lifetime.
    pub fn for_domain(registry: &TagRegistry, domain: ContentDomain) -> Self {
        Self {
            revalidate: registry.ttl(domain),
            tags: vec![registry.tag(domain).clone()],
        }
    }

    pub fn with_tag(mut self, tag: CacheTag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_freshness(mut self, registry: &TagRegistry, freshness: Freshness) -> Self {
        self.revalidate = freshness.ttl(registry.durations());
        self
    }
}

/// Read access to site content, one method per domain operation.
///
/// Shares the [`TagRegistry`] with the write path so a domain resolves to the same tag on both.
pub struct ContentService {
    records: Arc<dyn RecordStore>,
    cache: Arc<TaggedStore>,
    registry: Arc<TagRegistry>,
    per_page: u32,
}

impl ContentService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        cache: Arc<TaggedStore>,
        registry: Arc<TagRegistry>,
        per_page: u32,
    ) -> Self {
        Self {
            records,
            cache,
            registry,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// List `domain` with its default sort and expansion filling any option left unset.
    pub async fn list(
        &self,
        domain: ContentDomain,
        options: ListOptions,
    ) -> Result<RecordPage, ContentError> {
        if let Some(per_page) = options.per_page {
            if per_page == 0 || per_page > MAX_PER_PAGE {
                return Err(DomainError::invalid_key(
                    per_page.to_string(),
                    "per_page must be between 1 and 200",
                )
                .into());
            }
        }
        if options.page == Some(0) {
            return Err(DomainError::invalid_key("0", "page starts at 1").into());
        }

        // A caller filter narrows the domain's visibility filter; it never replaces it.
        let filter = match options.filter.as_deref() {
            Some(filter) if !filter.trim().is_empty() => {
                Some(self.scoped(domain, caller_filter(filter)?))
            }
            _ => None,
        };
        let options = ListOptions { filter, ..options }
        .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain);
        self.list_cached(domain, options, cache).await
    }

    /// Resolve one record by slug (for domains that carry one) or by id.
    pub async fn get_by_slug_or_id(
        &self,
        domain: ContentDomain,
        key: &str,
    ) -> Result<Record, ContentError> {
        let key = lookup_key(key)?;
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.record_tag(domain, key));
        self.get_cached(domain, key, cache).await
    }

    // Blogs

    pub async fn blogs(&self, page: u32) -> Result<RecordPage, ContentError> {
        self.list(ContentDomain::Blogs, ListOptions::default().page(page.max(1)))
            .await
    }

    pub async fn featured_blogs(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Blogs, limit, Some(Freshness::Medium))
            .await
    }

    pub async fn blogs_by_category(&self, category_id: &str) -> Result<RecordPage, ContentError> {
        let domain = ContentDomain::Blogs;
        let category_id = lookup_key(category_id)?;
        let options = ListOptions::default()
            .filter(self.scoped(domain, &format!("category = \"{category_id}\"")))
            .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.record_tag(ContentDomain::Categories, category_id));
        self.list_cached(domain, options, cache).await
    }

    pub async fn blog(&self, slug: &str) -> Result<Record, ContentError> {
        let domain = ContentDomain::Blogs;
        let slug = lookup_key(slug)?;
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.record_tag(domain, slug))
            .with_freshness(&self.registry, Freshness::Medium);
        self.get_cached(domain, slug, cache).await
    }

    // Authors and categories

    pub async fn authors(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Authors).await
    }

    pub async fn author(&self, key: &str) -> Result<Record, ContentError> {
        self.get_by_slug_or_id(ContentDomain::Authors, key).await
    }

    pub async fn categories(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Categories).await
    }

    pub async fn category(&self, slug: &str) -> Result<Record, ContentError> {
        self.get_by_slug_or_id(ContentDomain::Categories, slug).await
    }

    // Home page sections

    pub async fn testimonials(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Testimonials).await
    }

    pub async fn featured_testimonials(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Testimonials, limit, None).await
    }

    pub async fn partners(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Partners).await
    }

    pub async fn featured_partners(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Partners, limit, None).await
    }

    pub async fn features(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Features).await
    }

    pub async fn featured_features(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Features, limit, None).await
    }

    pub async fn features_by_category(&self, category: &str) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::Features, "category", category)
            .await
    }

    pub async fn integrations(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Integrations).await
    }

    pub async fn featured_integrations(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Integrations, limit, None).await
    }

    pub async fn integrations_by_category(
        &self,
        category: &str,
    ) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::Integrations, "category", category)
            .await
    }

    pub async fn cta_cards(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::CtaCards).await
    }

    // Pricing

    pub async fn pricing_plans(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::PricingPlans).await
    }

    /// The plan flagged as popular, if any.
    pub async fn popular_plan(&self) -> Result<Option<Record>, ContentError> {
        let domain = ContentDomain::PricingPlans;
        let options = ListOptions::default()
            .per_page(1)
            .filter(self.scoped(domain, "is_popular = true"))
            .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.popular_plan_tag());
        let page = self.list_cached(domain, options, cache).await?;
        Ok(page.items.into_iter().next())
    }

    // Company

    pub async fn leadership(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Leadership).await
    }

    pub async fn featured_leadership(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Leadership, limit, None).await
    }

    pub async fn company_values(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Values).await
    }

    pub async fn featured_values(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Values, limit, None).await
    }

    pub async fn milestones(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Milestones).await
    }

    pub async fn featured_milestones(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Milestones, limit, None).await
    }

    pub async fn company_stats(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::CompanyStats).await
    }

    pub async fn press_releases(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Press).await
    }

    pub async fn featured_press_releases(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Press, limit, None).await
    }

    // Careers

    pub async fn jobs(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Jobs).await
    }

    pub async fn featured_jobs(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Jobs, limit, None).await
    }

    pub async fn jobs_by_department(&self, department: &str) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::Jobs, "department", department)
            .await
    }

    pub async fn job(&self, id: &str) -> Result<Record, ContentError> {
        self.get_by_slug_or_id(ContentDomain::Jobs, id).await
    }

    pub async fn employee_benefits(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::EmployeeBenefits).await
    }

    pub async fn benefits_by_category(&self, category: &str) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::EmployeeBenefits, "category", category)
            .await
    }

    pub async fn locations(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Locations).await
    }

    pub async fn locations_by_city(&self, city: &str) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::Locations, "city", city).await
    }

    // Support and FAQs

    pub async fn support_resources(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Support).await
    }

    pub async fn support_by_category(&self, category: &str) -> Result<RecordPage, ContentError> {
        self.faceted(ContentDomain::Support, "category", category)
            .await
    }

    pub async fn faq_topics(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::FaqTopics).await
    }

    pub async fn faqs(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Faqs).await
    }

    pub async fn featured_faqs(&self, limit: u32) -> Result<RecordPage, ContentError> {
        self.featured(ContentDomain::Faqs, limit, None).await
    }

    pub async fn faqs_by_topic(&self, topic_id: &str) -> Result<RecordPage, ContentError> {
        let domain = ContentDomain::Faqs;
        let topic_id = lookup_key(topic_id)?;
        let options = ListOptions::default()
            .filter(self.scoped(domain, &format!("category = \"{topic_id}\"")))
            .per_page(FULL_LIST_PER_PAGE)
            .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.facet_tag(domain, topic_id));
        self.list_cached(domain, options, cache).await
    }

    pub async fn resource_articles(&self, page: u32) -> Result<RecordPage, ContentError> {
        self.list(
            ContentDomain::ResourceArticles,
            ListOptions::default().page(page.max(1)),
        )
        .await
    }

    pub async fn resource_article(&self, slug: &str) -> Result<Record, ContentError> {
        self.get_by_slug_or_id(ContentDomain::ResourceArticles, slug)
            .await
    }

    // Contact

    pub async fn contact_options(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::ContactOptions).await
    }

    pub async fn featured_contact_options(&self) -> Result<RecordPage, ContentError> {
        let domain = ContentDomain::ContactOptions;
        let options = ListOptions::default()
            .filter(self.scoped(domain, "is_featured = true"))
            .per_page(FULL_LIST_PER_PAGE)
            .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.featured_tag(domain));
        self.list_cached(domain, options, cache).await
    }

    /// Submitted enquiries, newest first.
    pub async fn enquiries(&self, page: u32) -> Result<RecordPage, ContentError> {
        self.list(ContentDomain::Enquiries, ListOptions::default().page(page.max(1)))
            .await
    }

    // Compliance and employer pages

    pub async fn compliance_items(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::Compliance).await
    }

    pub async fn security_features(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::SecurityFeatures).await
    }

    pub async fn process_steps(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::ProcessSteps).await
    }

    pub async fn employer_stats(&self) -> Result<RecordPage, ContentError> {
        self.all(ContentDomain::EmployerStats).await
    }

    async fn all(&self, domain: ContentDomain) -> Result<RecordPage, ContentError> {
        self.list(domain, ListOptions::default().per_page(FULL_LIST_PER_PAGE))
            .await
    }

    async fn featured(
        &self,
        domain: ContentDomain,
        limit: u32,
        freshness: Option<Freshness>,
    ) -> Result<RecordPage, ContentError> {
        let options = ListOptions::default()
            .per_page(limit.clamp(1, MAX_PER_PAGE))
            .filter(self.scoped(domain, "featured = true"))
            .or(self.defaults(domain));
        let mut cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.featured_tag(domain));
        if let Some(freshness) = freshness {
            cache = cache.with_freshness(&self.registry, freshness);
        }
        self.list_cached(domain, options, cache).await
    }

    async fn faceted(
        &self,
        domain: ContentDomain,
        field: &'static str,
        value: &str,
    ) -> Result<RecordPage, ContentError> {
        let value = facet_value(value)?;
        let options = ListOptions::default()
            .filter(self.scoped(domain, &format!("{field} = \"{value}\"")))
            .per_page(FULL_LIST_PER_PAGE)
            .or(self.defaults(domain));
        let cache = CacheOptions::for_domain(&self.registry, domain)
            .with_tag(self.registry.facet_tag(domain, value));
        self.list_cached(domain, options, cache).await
    }

    async fn list_cached(
        &self,
        domain: ContentDomain,
        options: ListOptions,
        cache: CacheOptions,
    ) -> Result<RecordPage, ContentError> {
        let key = CacheKey::fetch(domain.collection(), &("list", &options));
        self.cached(
            domain,
            None,
            key,
            cache,
            self.records.list(domain.collection(), &options),
        )
        .await
    }

    async fn get_cached(
        &self,
        domain: ContentDomain,
        key: &str,
        cache: CacheOptions,
    ) -> Result<Record, ContentError> {
        let cache_key = CacheKey::fetch(domain.collection(), &("one", key));

        if domain.has_slug() {
            let options = ListOptions::default()
                .page(1)
                .per_page(1)
                .filter(self.scoped(domain, &format!("(slug = \"{key}\" || id = \"{key}\")")))
                .or(self.defaults(domain));
            let page: RecordPage = self
                .cached(
                    domain,
                    Some(key),
                    cache_key,
                    cache,
                    self.records.list(domain.collection(), &options),
                )
                .await?;
            return page
                .items
                .into_iter()
                .next()
                .ok_or_else(|| ContentError::NotFound {
                    domain,
                    key: key.to_string(),
                });
        }

        let expand = self.defaults(domain).expand;
        self.cached(
            domain,
            Some(key),
            cache_key,
            cache,
            self.records
                .get_one(domain.collection(), key, expand.as_deref()),
        )
        .await
    }

    #[instrument(skip_all, fields(domain = %domain))]
    async fn cached<T, F>(
        &self,
        domain: ContentDomain,
        lookup: Option<&str>,
        key: CacheKey,
        cache: CacheOptions,
        fetch: F,
    ) -> Result<T, ContentError>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T, BackendError>>,
    {
        deps::record(&cache.tags);

        if let Some(CachedValue::Json(value)) = self.cache.get(&key) {
            match T::deserialize(value.as_ref()) {
                Ok(hit) => return Ok(hit),
                Err(err) => warn!(error = %err, "discarding undecodable cache entry"),
            }
        }

        let observed = self.cache.epoch();
        let started_at = Instant::now();
        let fetched = fetch
            .await
            .map_err(|err| ContentError::from_backend(domain, lookup, err))?;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!("content_fetch_duration_ms", "domain" => domain.as_str())
            .record(elapsed_ms);
        debug!(elapsed_ms, revalidate_secs = cache.revalidate.as_secs(), "fetched content");

        match serde_json::to_value(&fetched) {
            Ok(value) => {
                self.cache.put_since(
                    observed,
                    key,
                    CachedValue::Json(Arc::new(value)),
                    cache.tags.into_iter().collect(),
                    None,
                    cache.revalidate,
                );
            }
            Err(err) => warn!(error = %err, "content not cacheable"),
        }

        Ok(fetched)
    }

    /// `extra` combined with the domain's visibility filter.
    fn scoped(&self, domain: ContentDomain, extra: &str) -> String {
        match self.defaults(domain).filter {
            Some(base) => format!("({extra}) && ({base})"),
            None => extra.to_string(),
        }
    }

    fn defaults(&self, domain: ContentDomain) -> ListOptions {
        use ContentDomain as D;

        let base = ListOptions::default().page(1).per_page(self.per_page);
        match domain {
            D::Blogs => base
                .sort("-published_date")
                .filter("published = true")
                .expand("author,category"),
            D::Authors => base.sort("name").filter("active = true"),
            D::Categories => base.sort("name"),
            D::Press | D::ResourceArticles => {
                base.sort("-published_date").filter("published = true")
            }
            D::Partners | D::Features | D::Integrations | D::PricingPlans => {
                base.sort("order").filter("active = true")
            }
            D::Milestones => base.sort("-year"),
            D::Jobs => base.sort("-created").filter("status = \"open\""),
            D::Faqs => base.sort("order").expand("category"),
            D::ContactOptions => base.sort("-is_featured"),
            D::Enquiries => base.sort("-created"),
            D::Locations => base,
            D::Testimonials
            | D::Leadership
            | D::Values
            | D::CompanyStats
            | D::EmployeeBenefits
            | D::Support
            | D::FaqTopics
            | D::Compliance
            | D::SecurityFeatures
            | D::ProcessSteps
            | D::EmployerStats
            | D::CtaCards => base.sort("order"),
        }
    }
}

/// A record id or slug. Restricting the alphabet keeps keys safe to embed in filters.
fn lookup_key(key: &str) -> Result<&str, DomainError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(DomainError::invalid_key(key, "must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(DomainError::invalid_key(key, "too long"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::invalid_key(
            key,
            "only letters, digits, `-` and `_` are allowed",
        ));
    }
    Ok(key)
}

/// A caller-supplied filter expression. Its parentheses must balance outside string literals so
/// it stays one group once combined with another expression.
fn caller_filter(filter: &str) -> Result<&str, DomainError> {
    const REASON: &str = "filter has unbalanced parentheses or quotes";

    let filter = filter.trim();
    if filter.len() > MAX_FILTER_LEN {
        return Err(DomainError::invalid_key(filter, "filter is too long"));
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in filter.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| DomainError::invalid_key(filter, REASON))?;
                }
                _ => {}
            },
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(DomainError::invalid_key(filter, REASON));
    }
    Ok(filter)
}

/// A category, department or city name.
fn facet_value(value: &str) -> Result<&str, DomainError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_FACET_LEN {
        return Err(DomainError::invalid_key(value, "must be 1 to 64 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '&' | '.'))
    {
        return Err(DomainError::invalid_key(value, "contains unsupported characters"));
    }
    Ok(value)
}

//! Data behind each rendered site page.
//!
//! Reads run one after another within the request; every read records its tags so the page cache
//! can annotate the rendered output.

use std::sync::Arc;

use serde::Serialize;

use crate::application::content::{ContentError, ContentService};
use crate::domain::records::{Record, RecordPage};

const HOME_FEATURED: u32 = 6;
const FEATURED_POSTS: u32 = 3;
const RELATED_POSTS: usize = 3;

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub features: RecordPage,
    pub integrations: RecordPage,
    pub pricing_plans: RecordPage,
    pub testimonials: RecordPage,
    pub partners: RecordPage,
    pub stats: RecordPage,
    pub cta_cards: RecordPage,
    pub latest_posts: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct BlogIndexPage {
    pub posts: RecordPage,
    pub featured: RecordPage,
    pub categories: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct BlogPostPage {
    pub post: Record,
    pub related: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct PricingPage {
    pub plans: RecordPage,
    pub popular: Option<Record>,
    pub faqs: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct CareersPage {
    pub jobs: RecordPage,
    pub featured_jobs: RecordPage,
    pub benefits: RecordPage,
    pub values: RecordPage,
    pub locations: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct AboutPage {
    pub leadership: RecordPage,
    pub values: RecordPage,
    pub milestones: RecordPage,
    pub stats: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct ContactPage {
    pub contact_options: RecordPage,
    pub featured_options: RecordPage,
    pub locations: RecordPage,
    pub support: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct ResourcesPage {
    pub articles: RecordPage,
    pub press: RecordPage,
    pub support: RecordPage,
    pub faq_topics: RecordPage,
    pub faqs: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct ForEmployersPage {
    pub benefits: RecordPage,
    pub stats: RecordPage,
    pub integrations: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct ForEmployeesPage {
    pub benefits: RecordPage,
    pub steps: RecordPage,
    pub faqs: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct HowItWorksPage {
    pub steps: RecordPage,
    pub benefits: RecordPage,
}

#[derive(Debug, Serialize)]
pub struct CompliancePage {
    pub items: RecordPage,
    pub security: RecordPage,
}

pub struct PageService {
    content: Arc<ContentService>,
}

impl PageService {
    pub fn new(content: Arc<ContentService>) -> Self {
        Self { content }
    }

    pub async fn home(&self) -> Result<HomePage, ContentError> {
        let content = &self.content;
        Ok(HomePage {
            features: content.featured_features(HOME_FEATURED).await?,
            integrations: content.featured_integrations(HOME_FEATURED).await?,
            pricing_plans: content.pricing_plans().await?,
            testimonials: content.featured_testimonials(HOME_FEATURED).await?,
            partners: content.featured_partners(HOME_FEATURED).await?,
            stats: content.company_stats().await?,
            cta_cards: content.cta_cards().await?,
            latest_posts: content.featured_blogs(FEATURED_POSTS).await?,
        })
    }

    pub async fn blog_index(&self, page: u32) -> Result<BlogIndexPage, ContentError> {
        let content = &self.content;
        Ok(BlogIndexPage {
            posts: content.blogs(page).await?,
            featured: content.featured_blogs(FEATURED_POSTS).await?,
            categories: content.categories().await?,
        })
    }

    /// A post and up to three others from its category.
    pub async fn blog_post(&self, slug: &str) -> Result<BlogPostPage, ContentError> {
        let post = self.content.blog(slug).await?;
        let related = match post.str_field("category").filter(|id| !id.is_empty()) {
            Some(category) => self
                .content
                .blogs_by_category(category)
                .await?
                .items
                .into_iter()
                .filter(|candidate| candidate.id != post.id)
                .take(RELATED_POSTS)
                .collect(),
            None => Vec::new(),
        };
        Ok(BlogPostPage { post, related })
    }

    pub async fn pricing(&self) -> Result<PricingPage, ContentError> {
        let content = &self.content;
        Ok(PricingPage {
            plans: content.pricing_plans().await?,
            popular: content.popular_plan().await?,
            faqs: content.featured_faqs(HOME_FEATURED).await?,
        })
    }

    pub async fn careers(&self) -> Result<CareersPage, ContentError> {
        let content = &self.content;
        Ok(CareersPage {
            jobs: content.jobs().await?,
            featured_jobs: content.featured_jobs(FEATURED_POSTS).await?,
            benefits: content.employee_benefits().await?,
            values: content.company_values().await?,
            locations: content.locations().await?,
        })
    }

    pub async fn about(&self) -> Result<AboutPage, ContentError> {
        let content = &self.content;
        Ok(AboutPage {
            leadership: content.leadership().await?,
            values: content.company_values().await?,
            milestones: content.milestones().await?,
            stats: content.company_stats().await?,
        })
    }

    pub async fn contact(&self) -> Result<ContactPage, ContentError> {
        let content = &self.content;
        Ok(ContactPage {
            contact_options: content.contact_options().await?,
            featured_options: content.featured_contact_options().await?,
            locations: content.locations().await?,
            support: content.support_resources().await?,
        })
    }

    pub async fn resources(&self) -> Result<ResourcesPage, ContentError> {
        let content = &self.content;
        Ok(ResourcesPage {
            articles: content.resource_articles(1).await?,
            press: content.press_releases().await?,
            support: content.support_resources().await?,
            faq_topics: content.faq_topics().await?,
            faqs: content.faqs().await?,
        })
    }

    pub async fn for_employers(&self) -> Result<ForEmployersPage, ContentError> {
        let content = &self.content;
        Ok(ForEmployersPage {
            benefits: content.employee_benefits().await?,
            stats: content.employer_stats().await?,
            integrations: content.integrations().await?,
        })
    }

    pub async fn for_employees(&self) -> Result<ForEmployeesPage, ContentError> {
        let content = &self.content;
        Ok(ForEmployeesPage {
            benefits: content.employee_benefits().await?,
            steps: content.process_steps().await?,
            faqs: content.featured_faqs(HOME_FEATURED).await?,
        })
    }

    pub async fn how_it_works(&self) -> Result<HowItWorksPage, ContentError> {
        let content = &self.content;
        Ok(HowItWorksPage {
            steps: content.process_steps().await?,
            benefits: content.employee_benefits().await?,
        })
    }

    pub async fn compliance(&self) -> Result<CompliancePage, ContentError> {
        let content = &self.content;
        Ok(CompliancePage {
            items: content.compliance_items().await?,
            security: content.security_features().await?,
        })
    }
}

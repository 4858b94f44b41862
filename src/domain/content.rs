//! The closed set of content domains served by the site.

use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// A logical content category backed by exactly one backend collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentDomain {
    Blogs,
    Authors,
    Categories,
    Testimonials,
    Partners,
    Press,
    Features,
    Integrations,
    PricingPlans,
    Leadership,
    Values,
    Milestones,
    CompanyStats,
    Jobs,
    EmployeeBenefits,
    Locations,
    Support,
    FaqTopics,
    Faqs,
    ContactOptions,
    Enquiries,
    Compliance,
    SecurityFeatures,
    ProcessSteps,
    EmployerStats,
    CtaCards,
    ResourceArticles,
}

impl ContentDomain {
    pub const ALL: [ContentDomain; 27] = [
        Self::Blogs,
        Self::Authors,
        Self::Categories,
        Self::Testimonials,
        Self::Partners,
        Self::Press,
        Self::Features,
        Self::Integrations,
        Self::PricingPlans,
        Self::Leadership,
        Self::Values,
        Self::Milestones,
        Self::CompanyStats,
        Self::Jobs,
        Self::EmployeeBenefits,
        Self::Locations,
        Self::Support,
        Self::FaqTopics,
        Self::Faqs,
        Self::ContactOptions,
        Self::Enquiries,
        Self::Compliance,
        Self::SecurityFeatures,
        Self::ProcessSteps,
        Self::EmployerStats,
        Self::CtaCards,
        Self::ResourceArticles,
    ];

    /// Stable identifier used in URLs and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blogs => "blogs",
            Self::Authors => "authors",
            Self::Categories => "categories",
            Self::Testimonials => "testimonials",
            Self::Partners => "partners",
            Self::Press => "press",
            Self::Features => "features",
            Self::Integrations => "integrations",
            Self::PricingPlans => "pricing-plans",
            Self::Leadership => "leadership",
            Self::Values => "values",
            Self::Milestones => "milestones",
            Self::CompanyStats => "company-stats",
            Self::Jobs => "jobs",
            Self::EmployeeBenefits => "employee-benefits",
            Self::Locations => "locations",
            Self::Support => "support",
            Self::FaqTopics => "faq-topics",
            Self::Faqs => "faqs",
            Self::ContactOptions => "contact-options",
            Self::Enquiries => "enquiries",
            Self::Compliance => "compliance",
            Self::SecurityFeatures => "security-features",
            Self::ProcessSteps => "process-steps",
            Self::EmployerStats => "employer-stats",
            Self::CtaCards => "cta-cards",
            Self::ResourceArticles => "resource-articles",
        }
    }

    /// Name of the backing collection in the record store.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Blogs => "blogs",
            Self::Authors => "authors",
            Self::Categories => "category",
            Self::Testimonials => "testimonials",
            Self::Partners => "partners",
            Self::Press => "press",
            Self::Features => "features",
            Self::Integrations => "integrations",
            Self::PricingPlans => "pricing_plans",
            Self::Leadership => "leadership",
            Self::Values => "values",
            Self::Milestones => "company_milestones",
            Self::CompanyStats => "status",
            Self::Jobs => "jobs",
            Self::EmployeeBenefits => "employee_benefits",
            Self::Locations => "locations",
            Self::Support => "support",
            Self::FaqTopics => "faq_topics",
            Self::Faqs => "faqs",
            Self::ContactOptions => "contact_options",
            Self::Enquiries => "enquiries",
            Self::Compliance => "compliance_items",
            Self::SecurityFeatures => "security_features",
            Self::ProcessSteps => "process_steps",
            Self::EmployerStats => "employer_stats",
            Self::CtaCards => "cta_cards",
            Self::ResourceArticles => "resource_articles",
        }
    }

    /// Whether records in this domain carry a unique `slug` field.
    pub fn has_slug(self) -> bool {
        matches!(
            self,
            Self::Blogs | Self::Authors | Self::Categories | Self::ResourceArticles
        )
    }

    /// Whether the domain may be read through the public content API. Enquiries hold personal
    /// data and are only ever written.
    pub fn is_public(self) -> bool {
        !matches!(self, Self::Enquiries)
    }

    /// Older collection names still sent by webhook hooks.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Categories => &["categories"],
            Self::Press => &["press_releases"],
            Self::PricingPlans => &["pricing"],
            Self::Values => &["company_values"],
            Self::Milestones => &["milestones"],
            Self::CompanyStats => &["company_stats", "stats"],
            Self::Jobs => &["job_positions"],
            Self::EmployeeBenefits => &["benefits"],
            Self::Locations => &["office_locations"],
            Self::Support => &["support_resources"],
            Self::FaqTopics => &["faq_categories"],
            Self::Faqs => &["faq_items"],
            Self::ContactOptions => &["contacts"],
            _ => &[],
        }
    }

    /// Resolve a collection name as sent by the record store, tolerating case, spacing and
    /// legacy names.
    pub fn from_collection(name: &str) -> Option<Self> {
        let normalized = normalize_collection_name(name);
        Self::ALL.into_iter().find(|domain| {
            domain.collection() == normalized || domain.aliases().contains(&normalized.as_str())
        })
    }
}

impl fmt::Display for ContentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentDomain {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str() == value)
            .or_else(|| Self::from_collection(value))
            .ok_or_else(|| DomainError::unknown_domain(value))
    }
}

/// Lower-case and collapse runs of `_` or whitespace into a single `_`.
pub fn normalize_collection_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.trim().chars() {
        if ch == '_' || ch.is_whitespace() {
            if !in_separator {
                out.push('_');
            }
            in_separator = true;
        } else {
            out.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn identifiers_and_collections_are_unique() {
        let ids: HashSet<_> = ContentDomain::ALL.iter().map(|d| d.as_str()).collect();
        let collections: HashSet<_> = ContentDomain::ALL.iter().map(|d| d.collection()).collect();
        assert_eq!(ids.len(), ContentDomain::ALL.len());
        assert_eq!(collections.len(), ContentDomain::ALL.len());
    }

    #[test]
    fn legacy_collection_names_resolve() {
        assert_eq!(
            ContentDomain::from_collection("Pricing_Plans"),
            Some(ContentDomain::PricingPlans)
        );
        assert_eq!(
            ContentDomain::from_collection("Company  Milestones"),
            Some(ContentDomain::Milestones)
        );
        assert_eq!(
            ContentDomain::from_collection("job_positions"),
            Some(ContentDomain::Jobs)
        );
        assert_eq!(
            ContentDomain::from_collection("Contacts"),
            Some(ContentDomain::ContactOptions)
        );
        assert_eq!(ContentDomain::from_collection("webhooks"), None);
    }

    #[test]
    fn parses_identifier_or_collection() {
        assert_eq!(
            "contact-options".parse::<ContentDomain>().ok(),
            Some(ContentDomain::ContactOptions)
        );
        assert_eq!(
            "contact_options".parse::<ContentDomain>().ok(),
            Some(ContentDomain::ContactOptions)
        );
        assert!("unknown".parse::<ContentDomain>().is_err());
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(normalize_collection_name(" FAQ__Items "), "faq_items");
        assert_eq!(normalize_collection_name("office \t locations"), "office_locations");
    }
}

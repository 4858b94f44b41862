//! Contact enquiry submission.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::repos::{BackendError, RecordStore};
use crate::cache::{
    MutationAction, MutationEvent, RevalidationOutcome, RevalidationPlan, RevalidationTrigger,
    TagRegistry,
};
use crate::domain::content::ContentDomain;
use crate::domain::enquiry::{Enquiry, EnquiryForm, FieldErrors};

#[derive(Debug, Error)]
pub enum EnquiryError {
    #[error("enquiry failed validation for {} field(s)", .0.len())]
    Invalid(FieldErrors),
    #[error("failed to store enquiry")]
    Backend(#[from] BackendError),
}

/// A stored enquiry and what its revalidation did.
#[derive(Debug, Clone)]
pub struct EnquiryReceipt {
    pub id: String,
    pub revalidation: RevalidationOutcome,
}

pub struct EnquiryService {
    records: Arc<dyn RecordStore>,
    registry: Arc<TagRegistry>,
    trigger: Arc<RevalidationTrigger>,
}

impl EnquiryService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        registry: Arc<TagRegistry>,
        trigger: Arc<RevalidationTrigger>,
    ) -> Self {
        Self {
            records,
            registry,
            trigger,
        }
    }

    /// Validate, store, then revalidate. Invalidation failures do not fail the submission.
    #[instrument(skip_all, fields(interest = form.interest.as_deref().unwrap_or("contact")))]
    pub async fn submit(&self, form: &EnquiryForm) -> Result<EnquiryReceipt, EnquiryError> {
        let enquiry = Enquiry::validate(form).map_err(EnquiryError::Invalid)?;

        let domain = ContentDomain::Enquiries;
        let record = self
            .records
            .create(domain.collection(), &enquiry.to_record_body())
            .await?;

        let event = MutationEvent::new(domain, MutationAction::Create)
            .with_record(Some(record.id.clone()), None);
        let plan = RevalidationPlan::for_event(&self.registry, &event);
        let revalidation = self.trigger.apply(&plan).await;

        if !revalidation.is_clean() {
            warn!(
                event = %event.id,
                record = %record.id,
                failed = ?revalidation.failed,
                "Enquiry stored but revalidation was incomplete"
            );
        }
        info!(
            event = %event.id,
            occurred_at = %event.timestamp,
            record = %record.id,
            "Enquiry submitted"
        );

        Ok(EnquiryReceipt {
            id: record.id,
            revalidation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeBackend;
    use crate::cache::testing::RecordingStore;
    use crate::cache::CacheConfig;

    fn form() -> EnquiryForm {
        EnquiryForm {
            name: "Ada Lovelace".to_string(),
            email: "Ada@Example.com".to_string(),
            message: "We would like a demo for 400 staff.".to_string(),
            interest: Some("demo".to_string()),
            company: Some("Analytical Engines".to_string()),
            phone: Some("+44 (20) 7946-0958".to_string()),
        }
    }

    fn service(
        backend: Arc<FakeBackend>,
        store: Arc<RecordingStore>,
    ) -> EnquiryService {
        let trigger = RevalidationTrigger::new(store, &CacheConfig::default());
        EnquiryService::new(backend, Arc::new(TagRegistry::default()), Arc::new(trigger))
    }

    #[tokio::test]
    async fn submission_invalidates_contact_options_once() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(RecordingStore::default());
        let service = service(backend.clone(), store.clone());

        let receipt = service.submit(&form()).await.expect("submission succeeds");

        let calls = store.calls();
        let contact = calls
            .iter()
            .filter(|call| call.as_str() == "tag:contact-options")
            .count();
        assert_eq!(contact, 1);
        assert!(calls.contains(&format!("tag:enquiry:{}", receipt.id)));
        assert!(calls.contains(&"path:/contact".to_string()));

        let stored = backend.records("enquiries");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].str_field("email"), Some("ada@example.com"));
        assert_eq!(stored[0].str_field("status"), Some("new"));
    }

    #[tokio::test]
    async fn invalid_form_writes_and_invalidates_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(RecordingStore::default());
        let service = service(backend.clone(), store.clone());

        let mut form = form();
        form.email = "not-an-email".to_string();
        form.name = "A".to_string();

        match service.submit(&form).await {
            Err(EnquiryError::Invalid(errors)) => {
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("name"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(backend.creates(), 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_invalidation_still_reports_success() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(RecordingStore::failing());
        let service = service(backend.clone(), store.clone());

        let receipt = service.submit(&form()).await.expect("submission succeeds");

        assert!(!receipt.revalidation.is_clean());
        assert!(
            receipt
                .revalidation
                .failed
                .contains(&"tag:contact-options".to_string())
        );
        assert_eq!(backend.records("enquiries").len(), 1);
    }

    #[tokio::test]
    async fn backend_failure_skips_invalidation() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_unavailable(true);
        let store = Arc::new(RecordingStore::default());
        let service = service(backend.clone(), store.clone());

        let err = service.submit(&form()).await.expect_err("backend down");

        assert!(matches!(err, EnquiryError::Backend(ref source) if source.is_unavailable()));
        assert!(store.calls().is_empty());
    }
}

use std::sync::Arc;

use crate::application::content::ContentService;
use crate::application::enquiries::EnquiryService;
use crate::application::revalidation::RevalidationService;
use crate::config::RevalidationSettings;

#[derive(Clone)]
pub struct ApiState {
    pub content: Arc<ContentService>,
    pub enquiries: Arc<EnquiryService>,
    pub revalidation: Arc<RevalidationService>,
    pub secrets: Arc<RevalidationSettings>,
}

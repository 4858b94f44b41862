pub mod api;
mod middleware;
mod site;

pub use api::{ApiState, build_api_router};
pub use site::{SiteState, build_site_router};

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::middleware as axum_middleware;

use crate::application::content::ContentService;
use crate::application::enquiries::EnquiryService;
use crate::application::pages::PageService;
use crate::application::repos::RecordStore;
use crate::application::revalidation::RevalidationService;
use crate::cache::{CacheConfig, PageCacheState, RevalidationTrigger, TagRegistry, TaggedStore};
use crate::config::RevalidationSettings;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct RouterState {
    pub site: SiteState,
    pub api: ApiState,
}

impl RouterState {
    /// Wire every service over one record store and one tagged store, so reads and
    /// revalidation share a single [`TagRegistry`].
    pub fn assemble(
        records: Arc<dyn RecordStore>,
        cache: &CacheConfig,
        per_page: u32,
        secrets: RevalidationSettings,
    ) -> Self {
        let registry = Arc::new(TagRegistry::new(cache.durations));
        let store = Arc::new(TaggedStore::new(cache));
        let trigger = Arc::new(RevalidationTrigger::new(store.clone(), cache));

        let content = Arc::new(ContentService::new(
            records.clone(),
            store.clone(),
            registry.clone(),
            per_page,
        ));
        let pages = Arc::new(PageService::new(content.clone()));
        let enquiries = Arc::new(EnquiryService::new(
            records,
            registry.clone(),
            trigger.clone(),
        ));
        let revalidation = Arc::new(RevalidationService::new(registry.clone(), trigger));

        Self {
            site: SiteState {
                pages,
                cache: PageCacheState { store, registry },
            },
            api: ApiState {
                content,
                enquiries,
                revalidation,
                secrets: Arc::new(secrets),
            },
        }
    }
}

impl FromRef<RouterState> for SiteState {
    fn from_ref(state: &RouterState) -> Self {
        state.site.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

/// The whole HTTP surface: page data, the JSON API and health.
pub fn build_router(state: RouterState) -> Router {
    build_site_router(state.clone())
        .merge(build_api_router(state.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

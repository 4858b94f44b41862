//! Page-data routes.
//!
//! Each route returns the JSON a rendered page is built from and is cached by
//! [`page_cache_layer`] under the tags its reads recorded.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        pages::{
            AboutPage, BlogIndexPage, BlogPostPage, CareersPage, CompliancePage, ContactPage,
            ForEmployeesPage, ForEmployersPage, HomePage, HowItWorksPage, PageService,
            PricingPage, ResourcesPage,
        },
    },
    cache::{PageCacheState, page_cache_layer},
};

use super::RouterState;

#[derive(Clone)]
pub struct SiteState {
    pub pages: Arc<PageService>,
    pub cache: PageCacheState,
}

pub fn build_site_router(state: RouterState) -> Router<RouterState> {
    let cached_routes = Router::new()
        .route("/", get(home))
        .route("/blog", get(blog_index))
        .route("/blog/{slug}", get(blog_post))
        .route("/pricing", get(pricing))
        .route("/careers", get(careers))
        .route("/about", get(about))
        .route("/contact", get(contact))
        .route("/resources", get(resources))
        .route("/for-employers", get(for_employers))
        .route("/for-employees", get(for_employees))
        .route("/how-it-works", get(how_it_works))
        .route("/compliance", get(compliance))
        .layer(middleware::from_fn_with_state(
            state.site.cache.clone(),
            page_cache_layer,
        ));

    cached_routes.route("/_health", get(health))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<u32>,
}

type PageResult<T> = Result<Json<T>, HttpError>;

async fn home(State(state): State<SiteState>) -> PageResult<HomePage> {
    Ok(Json(state.pages.home().await?))
}

async fn blog_index(
    State(state): State<SiteState>,
    Query(query): Query<PageQuery>,
) -> PageResult<BlogIndexPage> {
    let page = query.page.unwrap_or(1).max(1);
    Ok(Json(state.pages.blog_index(page).await?))
}

async fn blog_post(
    State(state): State<SiteState>,
    Path(slug): Path<String>,
) -> PageResult<BlogPostPage> {
    Ok(Json(state.pages.blog_post(&slug).await?))
}

async fn pricing(State(state): State<SiteState>) -> PageResult<PricingPage> {
    Ok(Json(state.pages.pricing().await?))
}

async fn careers(State(state): State<SiteState>) -> PageResult<CareersPage> {
    Ok(Json(state.pages.careers().await?))
}

async fn about(State(state): State<SiteState>) -> PageResult<AboutPage> {
    Ok(Json(state.pages.about().await?))
}

async fn contact(State(state): State<SiteState>) -> PageResult<ContactPage> {
    Ok(Json(state.pages.contact().await?))
}

async fn resources(State(state): State<SiteState>) -> PageResult<ResourcesPage> {
    Ok(Json(state.pages.resources().await?))
}

async fn for_employers(State(state): State<SiteState>) -> PageResult<ForEmployersPage> {
    Ok(Json(state.pages.for_employers().await?))
}

async fn for_employees(State(state): State<SiteState>) -> PageResult<ForEmployeesPage> {
    Ok(Json(state.pages.for_employees().await?))
}

async fn how_it_works(State(state): State<SiteState>) -> PageResult<HowItWorksPage> {
    Ok(Json(state.pages.how_it_works().await?))
}

async fn compliance(State(state): State<SiteState>) -> PageResult<CompliancePage> {
    Ok(Json(state.pages.compliance().await?))
}

async fn health() -> &'static str {
    "ok"
}

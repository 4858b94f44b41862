//! Page response cache middleware.
//!
//! Caches successful GET responses of the page-data routes. Each cached page carries the tags its
//! content reads recorded plus its own route, so both tag and path invalidation reach it.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::deps;
use super::keys::CacheKey;
use super::registry::TagRegistry;
use super::store::{CachedResponse, CachedValue, TaggedStore};
use super::tags::{CacheTag, PagePath};

const MAX_CACHED_BODY: usize = 1024 * 1024;
const CACHE_STATUS_HEADER: &str = "x-cache";

/// Shared state for [`page_cache_layer`].
#[derive(Clone)]
pub struct PageCacheState {
    pub store: Arc<TaggedStore>,
    pub registry: Arc<TagRegistry>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.store.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let key = CacheKey::page(&path, request.uri().query().unwrap_or(""));

    if let Some(CachedValue::Response(cached)) = cache.store.get(&key) {
        debug!(outcome = "hit", "serving cached page");
        return build_response(cached);
    }

    let observed = cache.store.epoch();
    let (response, tags) = deps::with_collector(next.run(request)).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer page body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect(),
        body: bytes.clone(),
    };

    let ttl = page_ttl(&cache.registry, tags.iter());
    debug!(outcome = "miss", tags = tags.len(), ttl_secs = ttl.as_secs(), "caching page");
    cache.store.put_since(
        observed,
        key,
        CachedValue::Response(cached),
        tags,
        PagePath::parse(&path).ok(),
        ttl,
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Shortest lifetime among the domains a page was built from; the short tier when none is known.
fn page_ttl<'a>(registry: &TagRegistry, tags: impl Iterator<Item = &'a CacheTag>) -> Duration {
    tags.filter_map(|tag| registry.owner_of(tag))
        .map(|domain| registry.ttl(domain))
        .min()
        .unwrap_or_else(|| registry.durations().short_ttl())
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use http_body_util::BodyExt;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::domain::content::ContentDomain;

    fn state() -> PageCacheState {
        PageCacheState {
            store: Arc::new(TaggedStore::new(&CacheConfig::default())),
            registry: Arc::new(TagRegistry::default()),
        }
    }

    fn router(state: PageCacheState, hits: Arc<AtomicUsize>) -> Router {
        let registry = state.registry.clone();
        Router::new()
            .route(
                "/contact",
                get(move || {
                    let hits = hits.clone();
                    let registry = registry.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        deps::record([registry.tag(ContentDomain::ContactOptions)]);
                        "contact"
                    }
                }),
            )
            .layer(from_fn_with_state(state, page_cache_layer))
    }

    async fn fetch(router: &Router) -> (Option<String>, String) {
        let response = router
            .clone()
            .oneshot(Request::get("/contact").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let cache = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.into_body().collect().await.expect("body").to_bytes();
        (cache, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let state = state();
        let hits = Arc::new(AtomicUsize::new(0));
        let router = router(state, hits.clone());

        assert_eq!(fetch(&router).await, (None, "contact".to_string()));
        assert_eq!(fetch(&router).await, (Some("hit".to_string()), "contact".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tag_invalidation_drops_cached_page() {
        let state = state();
        let hits = Arc::new(AtomicUsize::new(0));
        let router = router(state.clone(), hits.clone());

        fetch(&router).await;
        let tag = state.registry.tag(ContentDomain::ContactOptions);
        assert_eq!(state.store.drop_tag(tag), 1);

        assert_eq!(fetch(&router).await.0, None);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn path_invalidation_drops_cached_page() {
        let state = state();
        let hits = Arc::new(AtomicUsize::new(0));
        let router = router(state.clone(), hits.clone());

        fetch(&router).await;
        let path = PagePath::parse("/contact").expect("valid path");
        assert_eq!(state.store.drop_path(&path), 1);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn page_built_across_an_invalidation_is_not_cached() {
        let state = state();
        let hits = Arc::new(AtomicUsize::new(0));
        let held = Arc::new(Notify::new());
        let released = Arc::new(Notify::new());
        let registry = state.registry.clone();
        let router = {
            let (hits, held, released) = (hits.clone(), held.clone(), released.clone());
            Router::new()
                .route(
                    "/contact",
                    get(move || {
                        let (hits, held, released) = (hits.clone(), held.clone(), released.clone());
                        let registry = registry.clone();
                        async move {
                            deps::record([registry.tag(ContentDomain::ContactOptions)]);
                            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                                held.notify_one();
                                released.notified().await;
                            }
                            "contact"
                        }
                    }),
                )
                .layer(from_fn_with_state(state.clone(), page_cache_layer))
        };

        let tag = state.registry.tag(ContentDomain::ContactOptions);
        let (first, ()) = tokio::join!(fetch(&router), async {
            held.notified().await;
            state.store.drop_tag(tag);
            released.notify_one();
        });
        assert_eq!(first.0, None);
        assert!(state.store.is_empty());

        assert_eq!(fetch(&router).await.0, None);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn page_ttl_takes_shortest_domain_lifetime() {
        let registry = TagRegistry::default();
        let tags = [
            registry.tag(ContentDomain::Leadership).clone(),
            registry.tag(ContentDomain::Blogs).clone(),
        ];
        assert_eq!(page_ttl(&registry, tags.iter()), Duration::from_secs(300));
        assert_eq!(page_ttl(&registry, [].iter()), Duration::from_secs(300));
    }
}

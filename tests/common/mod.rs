#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

use finwage_site::application::repos::{BackendError, ListOptions, RecordStore};
use finwage_site::cache::CacheConfig;
use finwage_site::config::RevalidationSettings;
use finwage_site::domain::records::{Record, RecordPage};
use finwage_site::infra::http::{RouterState, build_router};

/// Record store kept in memory. Filters match when any `field = "value"` term matches.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<Record>>>,
    lists: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub async fn insert(&self, collection: &str, record: Record) {
        self.records
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub async fn records(&self, collection: &str) -> Vec<Record> {
        self.records
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BackendError::unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

fn quoted_terms(filter: &str) -> Vec<(String, String)> {
    filter
        .split("||")
        .flat_map(|part| part.split("&&"))
        .filter_map(|term| {
            let term = term.trim().trim_matches(|c| c == '(' || c == ')');
            let (field, value) = term.split_once(" = ")?;
            let value = value.trim().strip_prefix('"')?.strip_suffix('"')?;
            Some((field.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn matches(record: &Record, filter: Option<&str>) -> bool {
    let terms = filter.map(quoted_terms).unwrap_or_default();
    terms.is_empty()
        || terms.iter().any(|(field, value)| match field.as_str() {
            "id" => &record.id == value,
            field => record.str_field(field) == Some(value.as_str()),
        })
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<RecordPage, BackendError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let per_page = options.per_page.unwrap_or(30);
        let items: Vec<Record> = self
            .records(collection)
            .await
            .into_iter()
            .filter(|record| matches(record, options.filter.as_deref()))
            .collect();
        Ok(RecordPage {
            page: options.page.unwrap_or(1),
            per_page,
            total_items: items.len() as u64,
            total_pages: 1,
            items,
        })
    }

    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        _expand: Option<&str>,
    ) -> Result<Record, BackendError> {
        self.check()?;
        self.records(collection)
            .await
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| BackendError::not_found(collection))
    }

    async fn create(&self, collection: &str, body: &Value) -> Result<Record, BackendError> {
        self.check()?;
        let mut record = Record::new(uuid::Uuid::new_v4().simple().to_string());
        if let Value::Object(fields) = body {
            record.fields = fields.clone();
        }
        self.insert(collection, record.clone()).await;
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.check()?;
        let mut records = self.records.lock().await;
        let entries = records.entry(collection.to_string()).or_default();
        entries.retain(|record| record.id != id);
        Ok(())
    }
}

pub fn router(store: Arc<MemoryStore>, secrets: RevalidationSettings) -> Router {
    let state = RouterState::assemble(store, &CacheConfig::default(), 20, secrets);
    build_router(state)
}

pub struct Reply {
    pub status: StatusCode,
    pub cache: Option<String>,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let cache = response
        .headers()
        .get("x-cache")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Reply {
        status,
        cache,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> Reply {
    send(
        router,
        Request::get(uri).body(Body::empty()).expect("request"),
    )
    .await
}

pub async fn post_json(router: &Router, uri: &str, headers: &[(&str, &str)], body: Value) -> Reply {
    let mut request = Request::post(uri).header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    send(
        router,
        request
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
}

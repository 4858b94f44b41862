//! In-memory record store for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::application::repos::{
    BackendError, CollectionRules, ListOptions, RecordStore, RuleSet,
};
use crate::domain::records::{Record, RecordPage};

static QUOTED_EQUALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+) = "([^"]*)""#).expect("valid pattern"));

/// Records per collection. Filters are honoured only for `field = "value"` terms, any of which
/// may match.
#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<HashMap<String, Vec<Record>>>,
    rules: Mutex<HashMap<String, RuleSet>>,
    last_list: Mutex<Option<ListOptions>>,
    reads: AtomicUsize,
    creates: AtomicUsize,
    unavailable: AtomicBool,
    reject_writes: AtomicBool,
    hold_list: AtomicBool,
    held: Notify,
    released: Notify,
}

impl FakeBackend {
    pub fn insert(&self, collection: &str, record: Record) {
        self.records
            .lock()
            .expect("records lock")
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.records
            .lock()
            .expect("records lock")
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_rules(&self, collection: &str, rules: RuleSet) {
        self.rules
            .lock()
            .expect("rules lock")
            .insert(collection.to_string(), rules);
    }

    pub fn rules_of(&self, collection: &str) -> RuleSet {
        self.rules
            .lock()
            .expect("rules lock")
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn last_list_options(&self) -> Option<ListOptions> {
        self.last_list.lock().expect("list lock").clone()
    }

    /// Park the next `list` after it has read its records, until [`FakeBackend::release`].
    pub fn hold_next_list(&self) {
        self.hold_list.store(true, Ordering::SeqCst);
    }

    pub async fn until_held(&self) {
        self.held.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BackendError::unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

fn matches(record: &Record, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let mut terms = QUOTED_EQUALITY.captures_iter(filter).peekable();
    if terms.peek().is_none() {
        return true;
    }
    terms.any(|term| {
        let value = &term[2];
        match &term[1] {
            "id" => record.id == value,
            field => record.str_field(field) == Some(value),
        }
    })
}

#[async_trait]
impl RecordStore for FakeBackend {
    async fn list(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<RecordPage, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        *self.last_list.lock().expect("list lock") = Some(options.clone());
        self.check_available()?;

        let per_page = options.per_page.unwrap_or(30);
        let page = options.page.unwrap_or(1);
        let matching: Vec<Record> = self
            .records(collection)
            .into_iter()
            .filter(|record| matches(record, options.filter.as_deref()))
            .collect();
        let total_items = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect();

        let result = RecordPage {
            page,
            per_page,
            total_items,
            total_pages: total_items.div_ceil(u64::from(per_page)) as u32,
            items,
        };
        if self.hold_list.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.released.notified().await;
        }
        Ok(result)
    }

    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        _expand: Option<&str>,
    ) -> Result<Record, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.records(collection)
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| BackendError::not_found(collection))
    }

    async fn create(&self, collection: &str, body: &Value) -> Result<Record, BackendError> {
        self.check_available()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(BackendError::rejected(400, "Failed to create record."));
        }
        let index = self.creates.fetch_add(1, Ordering::SeqCst);
        let mut record = Record::new(format!("rec{index:012}"));
        if let Value::Object(fields) = body {
            record.fields = fields.clone();
        }
        self.insert(collection, record.clone());
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.check_available()?;
        let mut records = self.records.lock().expect("records lock");
        let entries = records.entry(collection.to_string()).or_default();
        let before = entries.len();
        entries.retain(|record| record.id != id);
        if entries.len() == before {
            return Err(BackendError::not_found(collection));
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionRules for FakeBackend {
    async fn rules(&self, collection: &str) -> Result<RuleSet, BackendError> {
        self.check_available()?;
        Ok(self.rules_of(collection))
    }

    async fn update_rules(&self, collection: &str, rules: &RuleSet) -> Result<(), BackendError> {
        self.check_available()?;
        let mut all = self.rules.lock().expect("rules lock");
        let current = all.entry(collection.to_string()).or_default();
        for (kind, value) in rules {
            current.insert(*kind, value.clone());
        }
        Ok(())
    }
}

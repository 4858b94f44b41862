//! Seeding collections from a TOML file.
//!
//! ```toml
//! [[collections]]
//! name = "faq_topics"
//!
//! [[collections.records]]
//! name = "Getting started"
//! order = 1
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::repos::{BackendError, RecordStore};
use crate::cache::{RevalidationOutcome, RevalidationPlan, RevalidationTrigger, TagRegistry};
use crate::domain::content::ContentDomain;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("seed file `{}` is malformed", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("record {index} of `{collection}` cannot be represented as JSON")]
    Convert {
        collection: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to seed `{collection}` record `{label}`")]
    Create {
        collection: String,
        label: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub collections: Vec<SeedCollection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCollection {
    pub name: String,
    #[serde(default)]
    pub records: Vec<toml::Table>,
}

impl SeedFile {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, SeedError> {
        toml::from_str(contents).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn read(path: &Path) -> Result<Self, SeedError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SeedError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::parse(path, &contents)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    /// Records created per collection, in file order.
    pub created: Vec<(String, usize)>,
    pub revalidation: RevalidationOutcome,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created.iter().map(|(_, count)| count).sum()
    }
}

pub struct Seeder {
    records: Arc<dyn RecordStore>,
    registry: Arc<TagRegistry>,
    trigger: Arc<RevalidationTrigger>,
}

impl Seeder {
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

    /// Create every record in file order. The first failure stops the run.
    #[instrument(skip_all, fields(collections = file.collections.len()))]
    pub async fn seed(&self, file: &SeedFile) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();

        for collection in &file.collections {
            if ContentDomain::from_collection(&collection.name).is_none() {
                warn!(collection = %collection.name, "Seeding a collection the site does not read");
            }

            let mut created = 0;
            for (index, record) in collection.records.iter().enumerate() {
                let body = serde_json::to_value(record).map_err(|source| SeedError::Convert {
                    collection: collection.name.clone(),
                    index,
                    source,
                })?;
                let label = label_of(&body).unwrap_or_else(|| format!("#{}", index + 1));

                let stored = self
                    .records
                    .create(&collection.name, &body)
                    .await
                    .map_err(|source| SeedError::Create {
                        collection: collection.name.clone(),
                        label: label.clone(),
                        source,
                    })?;
                info!(collection = %collection.name, id = %stored.id, record = %label, "Seeded record");
                created += 1;
            }

            info!(collection = %collection.name, created, "Seeded collection");
            report.created.push((collection.name.clone(), created));
        }

        report.revalidation = self
            .trigger
            .apply(&RevalidationPlan::everything(&self.registry))
            .await;
        if !report.revalidation.is_clean() {
            warn!(
                failed = ?report.revalidation.failed,
                "Seeding finished but revalidation was incomplete"
            );
        }

        Ok(report)
    }
}

fn label_of(body: &Value) -> Option<String> {
    ["name", "title", "slug"].into_iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::application::testing::FakeBackend;
    use crate::cache::CacheConfig;
    use crate::cache::testing::RecordingStore;

    const SEED: &str = r#"
[[collections]]
name = "faq_topics"

[[collections.records]]
name = "Getting started"
order = 1

[[collections.records]]
name = "Payments"
order = 2

[[collections]]
name = "faqs"

[[collections.records]]
question = "How fast are withdrawals?"
featured = true
"#;

    fn seeder(backend: Arc<FakeBackend>, store: Arc<RecordingStore>) -> Seeder {
        let trigger = RevalidationTrigger::new(store, &CacheConfig::default());
        Seeder::new(backend, Arc::new(TagRegistry::default()), Arc::new(trigger))
    }

    #[tokio::test]
    async fn seeds_in_file_order_then_revalidates_everything() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SEED.as_bytes()).expect("write seed");
        let seed = SeedFile::read(file.path()).await.expect("seed parses");

        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(RecordingStore::default());
        let report = seeder(backend.clone(), store.clone())
            .seed(&seed)
            .await
            .expect("seeding succeeds");

        assert_eq!(
            report.created,
            vec![("faq_topics".to_string(), 2), ("faqs".to_string(), 1)]
        );
        assert_eq!(report.total(), 3);

        let topics = backend.records("faq_topics");
        assert_eq!(topics[0].str_field("name"), Some("Getting started"));
        assert_eq!(topics[1].fields.get("order"), Some(&serde_json::json!(2)));
        assert_eq!(backend.records("faqs")[0].bool_field("featured"), Some(true));

        let calls = store.calls();
        assert!(calls.contains(&"tag:faqs".to_string()));
        assert!(calls.contains(&"path:/".to_string()));
    }

    #[tokio::test]
    async fn failure_stops_the_run_and_names_the_record() {
        let seed = SeedFile::parse(Path::new("seed.toml"), SEED).expect("seed parses");
        let backend = Arc::new(FakeBackend::default());
        backend.set_reject_writes(true);
        let store = Arc::new(RecordingStore::default());

        let err = seeder(backend.clone(), store.clone())
            .seed(&seed)
            .await
            .expect_err("writes rejected");

        match err {
            SeedError::Create {
                collection, label, ..
            } => {
                assert_eq!(collection, "faq_topics");
                assert_eq!(label, "Getting started");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.calls().is_empty());
    }

    #[test]
    fn malformed_files_are_reported() {
        let err = SeedFile::parse(Path::new("bad.toml"), "[[collections]]\nrecords = 3")
            .expect_err("malformed");
        assert!(matches!(err, SeedError::Parse { .. }));
    }
}

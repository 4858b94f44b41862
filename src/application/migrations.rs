//! Reversible collection rule migrations.
//!
//! Each migration is a JSON document embedded from `migrations/`, named
//! `{timestamp}_{name}.json`, holding the rules to set on one collection going up and the rules
//! that restore it going down. Applied versions are kept in a ledger collection of the record
//! store itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use include_dir::{Dir, include_dir};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::application::repos::{
    BackendError, CollectionRules, ListOptions, RecordStore, RuleKind, RuleSet,
};

static EMBEDDED_MIGRATIONS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/migrations");

const LEDGER_PAGE_SIZE: u32 = 200;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration file `{file}` is not named `<timestamp>_<name>.json`")]
    BadFileName { file: String },
    #[error("migration `{file}` is malformed")]
    Malformed {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("migration `{file}` sets unknown rule `{rule}`")]
    UnknownRule { file: String, rule: String },
    #[error("migration version {version} is defined more than once")]
    DuplicateVersion { version: u64 },
    #[error("migration `{file}` changes no rules going up")]
    EmptyUp { file: String },
    #[error("migration `{file}` does not restore the rules it changes")]
    NotReversible { file: String },
    #[error("migration version {version} does not exist")]
    UnknownVersion { version: u64 },
    #[error("failed to apply migration {version} to `{collection}`")]
    Apply {
        version: u64,
        collection: String,
        #[source]
        source: BackendError,
    },
    #[error("failed to access the migration ledger `{ledger}`")]
    Ledger {
        ledger: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationDocument {
    collection: String,
    up: BTreeMap<String, Option<String>>,
    down: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u64,
    pub name: String,
    /// Collection id or name.
    pub collection: String,
    pub up: RuleSet,
    pub down: RuleSet,
}

impl Migration {
    pub fn parse(file: &str, contents: &str) -> Result<Self, MigrationError> {
        let bad_name = || MigrationError::BadFileName {
            file: file.to_string(),
        };
        let stem = file.strip_suffix(".json").ok_or_else(bad_name)?;
        let (version, name) = stem.split_once('_').ok_or_else(bad_name)?;
        let version: u64 = version.parse().map_err(|_| bad_name())?;
        if name.is_empty() {
            return Err(bad_name());
        }

        let document: MigrationDocument =
            serde_json::from_str(contents).map_err(|source| MigrationError::Malformed {
                file: file.to_string(),
                source,
            })?;

        let up = rule_set(file, document.up)?;
        let down = rule_set(file, document.down)?;
        if up.is_empty() {
            return Err(MigrationError::EmptyUp {
                file: file.to_string(),
            });
        }
        if !up.keys().eq(down.keys()) {
            return Err(MigrationError::NotReversible {
                file: file.to_string(),
            });
        }

        Ok(Self {
            version,
            name: name.to_string(),
            collection: document.collection,
            up,
            down,
        })
    }
}

fn rule_set(file: &str, raw: BTreeMap<String, Option<String>>) -> Result<RuleSet, MigrationError> {
    raw.into_iter()
        .map(|(rule, value)| {
            let kind = rule
                .parse::<RuleKind>()
                .map_err(|_| MigrationError::UnknownRule {
                    file: file.to_string(),
                    rule,
                })?;
            Ok((kind, value))
        })
        .collect()
}

/// Migrations sorted by ascending version.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Migrations compiled into the binary.
    pub fn embedded() -> Result<Self, MigrationError> {
        Self::from_files(EMBEDDED_MIGRATIONS.files().filter_map(|file| {
            let name = file.path().file_name()?.to_str()?;
            let contents = file.contents_utf8()?;
            name.ends_with(".json").then_some((name, contents))
        }))
    }

    pub fn from_files<'a>(
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, MigrationError> {
        let mut migrations = files
            .into_iter()
            .map(|(name, contents)| Migration::parse(name, contents))
            .collect::<Result<Vec<_>, _>>()?;
        migrations.sort_by_key(|migration| migration.version);

        for pair in migrations.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(MigrationError::DuplicateVersion {
                    version: pair[0].version,
                });
            }
        }

        Ok(Self { migrations })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    fn contains(&self, version: u64) -> bool {
        self.migrations
            .binary_search_by_key(&version, |migration| migration.version)
            .is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: u64,
    pub name: String,
    pub applied: bool,
}

/// One ledger row: the migration version and the record holding it.
#[derive(Debug, Clone)]
struct LedgerEntry {
    record_id: String,
}

pub struct Migrator {
    records: Arc<dyn RecordStore>,
    rules: Arc<dyn CollectionRules>,
    ledger: String,
    set: MigrationSet,
}

impl Migrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        rules: Arc<dyn CollectionRules>,
        ledger: impl Into<String>,
        set: MigrationSet,
    ) -> Self {
        Self {
            records,
            rules,
            ledger: ledger.into(),
            set,
        }
    }

    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let applied = self.applied().await?;
        Ok(self
            .set
            .iter()
            .map(|migration| MigrationStatus {
                version: migration.version,
                name: migration.name.clone(),
                applied: applied.contains_key(&migration.version),
            })
            .collect())
    }

    /// Apply pending migrations in ascending order, stopping after `to` when given.
    #[instrument(skip(self), fields(ledger = %self.ledger))]
    pub async fn up(&self, to: Option<u64>) -> Result<Vec<u64>, MigrationError> {
        if let Some(version) = to.filter(|version| !self.set.contains(*version)) {
            return Err(MigrationError::UnknownVersion { version });
        }

        let applied = self.applied().await?;
        let mut done = Vec::new();
        for migration in self.set.iter() {
            if to.is_some_and(|limit| migration.version > limit) {
                break;
            }
            if applied.contains_key(&migration.version) {
                debug!(version = migration.version, "Migration already applied");
                continue;
            }

            self.set_rules(migration, &migration.up).await?;
            let entry = json!({ "version": migration.version, "name": migration.name });
            self.records
                .create(&self.ledger, &entry)
                .await
                .map_err(|source| self.ledger_error(source))?;

            info!(
                version = migration.version,
                name = %migration.name,
                collection = %migration.collection,
                "Applied migration"
            );
            done.push(migration.version);
        }

        if done.is_empty() {
            info!("No pending migrations");
        }
        Ok(done)
    }

    /// Revert the `steps` most recently applied migrations, newest first.
    #[instrument(skip(self), fields(ledger = %self.ledger))]
    pub async fn down(&self, steps: usize) -> Result<Vec<u64>, MigrationError> {
        let applied = self.applied().await?;
        let mut done = Vec::new();

        for migration in self
            .set
            .iter()
            .rev()
            .filter(|migration| applied.contains_key(&migration.version))
            .take(steps)
        {
            self.set_rules(migration, &migration.down).await?;
            if let Some(entry) = applied.get(&migration.version) {
                self.records
                    .delete(&self.ledger, &entry.record_id)
                    .await
                    .map_err(|source| self.ledger_error(source))?;
            }

            info!(
                version = migration.version,
                name = %migration.name,
                collection = %migration.collection,
                "Reverted migration"
            );
            done.push(migration.version);
        }

        if done.is_empty() {
            info!("No applied migrations to revert");
        }
        Ok(done)
    }

    async fn set_rules(&self, migration: &Migration, rules: &RuleSet) -> Result<(), MigrationError> {
        self.rules
            .update_rules(&migration.collection, rules)
            .await
            .map_err(|source| MigrationError::Apply {
                version: migration.version,
                collection: migration.collection.clone(),
                source,
            })
    }

    /// Versions recorded in the ledger. Rows with unrecognized versions are ignored.
    async fn applied(&self) -> Result<BTreeMap<u64, LedgerEntry>, MigrationError> {
        let mut applied = BTreeMap::new();
        let mut page = 1;

        loop {
            let options = ListOptions::default()
                .page(page)
                .per_page(LEDGER_PAGE_SIZE)
                .sort("version");
            let listing = self
                .records
                .list(&self.ledger, &options)
                .await
                .map_err(|source| self.ledger_error(source))?;

            for record in listing.items {
                let Some(version) = record.fields.get("version").and_then(serde_json::Value::as_u64) else {
                    continue;
                };
                if self.set.contains(version) {
                    applied.insert(
                        version,
                        LedgerEntry {
                            record_id: record.id,
                        },
                    );
                }
            }

            if page >= listing.total_pages {
                break;
            }
            page += 1;
        }

        Ok(applied)
    }

    fn ledger_error(&self, source: BackendError) -> MigrationError {
        MigrationError::Ledger {
            ledger: self.ledger.clone(),
            source,
        }
    }
}

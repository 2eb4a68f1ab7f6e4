//! In-process reference store with optional JSON persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigResult;
use crate::hsm::HsmProbe;
use crate::snapshot::{ConfigEntry, ConfigSet, EntryType};
use crate::store::{ConfigStore, StoreLoad};
use crate::tree::{DESC_SUFFIX, TYPE_SUFFIX};

/// One persisted row: value plus its metadata columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredRow {
    value: String,
    #[serde(default)]
    entry_type: EntryType,
    #[serde(default)]
    description: Option<String>,
}

/// A thread-safe configuration store backed by an in-memory map.
///
/// Serves as the reference [`ConfigStore`] and as the test double for
/// the cache. With a persistence path, rows are loaded at construction
/// and saved back after every mutation. With an HSM probe attached,
/// `fetch_all` reports `delay = true` while the probe is not ready and
/// omits password-typed rows, mimicking a backend that cannot decrypt
/// protected rows yet.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<DashMap<String, StoredRow>>,
    persistence_path: Option<String>,
    hsm: Option<Arc<dyn HsmProbe>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            persistence_path,
            hsm: None,
        }
    }

    /// Attach an HSM probe gating protected rows.
    pub fn with_hsm(mut self, hsm: Arc<dyn HsmProbe>) -> Self {
        self.hsm = Some(hsm);
        self
    }

    /// Load rows from file if it exists.
    pub fn load_from_file(path: &str) -> ConfigResult<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let rows: BTreeMap<String, StoredRow> = serde_json::from_reader(reader)?;

            let count = rows.len();
            for (key, row) in rows {
                store.rows.insert(key, row);
            }
            tracing::info!(rows = count, path, "loaded configuration rows from file");
        }
        Ok(store)
    }

    /// Save rows to the persistence file, if one is configured.
    pub fn save_to_file(&self) -> ConfigResult<()> {
        if let Some(path) = &self.persistence_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);

            // Collect to an ordered map for stable file contents.
            let rows: BTreeMap<String, StoredRow> = self
                .rows
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();

            serde_json::to_writer(writer, &rows)?;
            tracing::debug!(rows = rows.len(), path = %path, "saved configuration rows to file");
        }
        Ok(())
    }

    /// Number of persisted rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn hsm_ready(&self) -> bool {
        self.hsm.as_ref().map_or(true, |hsm| hsm.is_ready())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn fetch_all(&self) -> ConfigResult<StoreLoad> {
        let ready = self.hsm_ready();
        let mut entries = ConfigSet::new();

        for row in self.rows.iter() {
            let key = row.key();
            let stored = row.value();

            // Protected rows stay out of the load until the HSM can
            // decrypt them; the resulting snapshot is incomplete.
            if stored.entry_type.is_secret() && !ready {
                continue;
            }
            entries.insert(key.clone(), stored.value.clone());

            if stored.entry_type != EntryType::String {
                entries.insert(
                    format!("{key}{TYPE_SUFFIX}"),
                    stored.entry_type.as_tag().to_string(),
                );
            }
            if let Some(description) = &stored.description {
                entries.insert(format!("{key}{DESC_SUFFIX}"), description.clone());
            }
        }

        Ok(StoreLoad {
            entries,
            delay: !ready,
        })
    }

    async fn write(&self, entry: &ConfigEntry) -> ConfigResult<()> {
        self.rows.insert(
            entry.key.clone(),
            StoredRow {
                value: entry.value.clone(),
                entry_type: entry.entry_type.clone(),
                description: entry.description.clone(),
            },
        );
        self.save_to_file()
    }

    async fn delete(&self, key: &str) -> ConfigResult<()> {
        self.rows.remove(key);
        self.save_to_file()
    }
}

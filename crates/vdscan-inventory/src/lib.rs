//! Persistent per-agent detection inventory.
//!
//! The store is an ordered utf-8 key space over JSON records. Keys follow
//! `<agent>_<packageItemId|osName>_<cveId>`, which makes every per-agent
//! and per-item operation a prefix scan. Persistence is write-through: the
//! full index is kept in memory as a `BTreeMap` (ordered iteration is what
//! the sweeps rely on) and flushed to `index.json` in the store directory
//! after every mutation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const INDEX_FILE: &str = "index.json";

/// One persisted detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The last-built detection document for this key.
    pub element: serde_json::Value,
    /// Hotfix identifiers that remediate the CVE, captured at match time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediations: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(element: serde_json::Value, remediations: Vec<String>) -> Self {
        Self {
            element,
            remediations,
            updated_at: Utc::now(),
        }
    }
}

/// Ordered persistent key-value store for detection records.
///
/// Each logical operation takes the internal lock once; callers need no
/// external synchronization.
pub struct InventoryStore {
    dir: PathBuf,
    state: Mutex<BTreeMap<String, StoredRecord>>,
}

impl InventoryStore {
    /// Open (or create) a store directory and load its index.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create inventory directory {}", dir.display()))?;

        let index_path = dir.join(INDEX_FILE);
        let state = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path).with_context(|| {
                format!("failed to read inventory index {}", index_path.display())
            })?;
            serde_json::from_str(&content).with_context(|| {
                format!("failed to parse inventory index {}", index_path.display())
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            dir,
            state: Mutex::new(state),
        })
    }

    fn flush(&self, state: &BTreeMap<String, StoredRecord>) -> Result<()> {
        let index_path = self.dir.join(INDEX_FILE);
        let content =
            serde_json::to_string(state).context("failed to serialize inventory index")?;
        std::fs::write(&index_path, content)
            .with_context(|| format!("failed to write inventory index {}", index_path.display()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.state.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, record: StoredRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(key.to_string(), record);
        self.flush(&state)
    }

    pub fn remove(&self, key: &str) -> Result<Option<StoredRecord>> {
        let mut state = self.state.lock().unwrap();
        let removed = state.remove(key);
        if removed.is_some() {
            self.flush(&state)?;
        }
        Ok(removed)
    }

    /// All records whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, StoredRecord)> {
        let state = self.state.lock().unwrap();
        state
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    /// Remove and return every record under `prefix`, in key order.
    pub fn remove_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredRecord)>> {
        let mut state = self.state.lock().unwrap();
        let keys: Vec<String> = state
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = state.remove(&key) {
                removed.push((key, record));
            }
        }
        if !removed.is_empty() {
            self.flush(&state)?;
        }
        debug!(prefix, count = removed.len(), "removed inventory prefix");
        Ok(removed)
    }

    /// Distinct agent ids present in the key space (prefix up to the first
    /// underscore), in order.
    pub fn agent_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ids = BTreeSet::new();
        for key in state.keys() {
            if let Some((agent, _)) = key.split_once('_') {
                ids.insert(agent.to_string());
            }
        }
        ids.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().is_empty()
    }

    /// Drop every record in the store.
    pub fn clear(&self) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let count = state.len();
        state.clear();
        self.flush(&state)?;
        Ok(count)
    }
}

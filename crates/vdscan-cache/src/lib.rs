//! Bounded per-agent caches shared by every pipeline stage.
//!
//! Two mappings, both LRU-evicted and mutex-guarded:
//!
//! - [`OsDataCache`] - agent id -> most recent OS descriptor, written on
//!   every OS-insert event and read by every other event from that agent
//! - [`RemediationDataCache`] - agent id -> set of hotfixes known to be
//!   installed on that agent

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;
use vdscan_core::model::Os;

fn capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(NonZeroUsize::new(1000).unwrap())
}

/// Most recent OS descriptor per agent.
pub struct OsDataCache {
    inner: Mutex<LruCache<String, Os>>,
}

impl OsDataCache {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity(size))),
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<Os> {
        self.inner.lock().unwrap().get(agent_id).cloned()
    }

    pub fn set(&self, agent_id: &str, os: Os) {
        debug!(agent_id, platform = %os.platform, "caching OS descriptor");
        self.inner.lock().unwrap().put(agent_id.to_string(), os);
    }
}

/// Hotfixes known to be installed on one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    pub hotfixes: HashSet<String>,
}

/// Installed-hotfix set per agent.
pub struct RemediationDataCache {
    inner: Mutex<LruCache<String, Remediation>>,
}

impl RemediationDataCache {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity(size))),
        }
    }

    /// Missing agents read as an empty remediation set.
    pub fn get(&self, agent_id: &str) -> Remediation {
        self.inner
            .lock()
            .unwrap()
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_hotfix(&self, agent_id: &str, hotfix: &str) {
        let mut cache = self.inner.lock().unwrap();
        match cache.get_mut(agent_id) {
            Some(remediation) => {
                remediation.hotfixes.insert(hotfix.to_string());
            }
            None => {
                let mut remediation = Remediation::default();
                remediation.hotfixes.insert(hotfix.to_string());
                cache.put(agent_id.to_string(), remediation);
            }
        }
    }

    pub fn remove_hotfix(&self, agent_id: &str, hotfix: &str) {
        if let Some(remediation) = self.inner.lock().unwrap().get_mut(agent_id) {
            remediation.hotfixes.remove(hotfix);
        }
    }
}

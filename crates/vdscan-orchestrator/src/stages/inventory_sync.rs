//! Inventory write-through and transition detection.
//!
//! These stages are the only writers of the inventory store. An alert is
//! produced exactly when a `(agent, item, cve)` key transitions between
//! present and absent; elements that describe already-known detections are
//! dropped before they reach the builders.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::sinks::StopFlag;
use crate::stages::{Flow, Stage};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use vdscan_cache::RemediationDataCache;
use vdscan_inventory::{InventoryStore, StoredRecord};

fn store_err(err: anyhow::Error) -> ScanError {
    ScanError::StoreAccess(err)
}

/// The CVE id is the key segment after the last underscore.
fn cve_of_key(key: &str) -> &str {
    key.rsplit('_').next().unwrap_or(key)
}

/// Flip a stored detection document into its DELETED form.
fn deleted_element(key: &str, record: &StoredRecord) -> Value {
    let mut element = record.element.clone();
    if let Some(object) = element.as_object_mut() {
        object.insert("operation".into(), Value::String("DELETED".into()));
        object.insert("id".into(), Value::String(key.to_string()));
    }
    element
}

/// Idempotent insertion of the scanner's matches.
pub struct EventInsertInventory {
    store: Arc<InventoryStore>,
}

impl EventInsertInventory {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

impl Stage for EventInsertInventory {
    fn name(&self) -> &'static str {
        "EventInsertInventory"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let cves: Vec<String> = ctx.elements.keys().cloned().collect();
        for cve_id in cves {
            let key = ctx.element_id(&cve_id);
            if self.store.contains(&key) {
                // Known detection, not a transition.
                ctx.elements.remove(&cve_id);
                ctx.match_conditions.remove(&cve_id);
                continue;
            }

            let element = ctx.elements[&cve_id].clone();
            let remediations = ctx.remediations.get(&cve_id).cloned().unwrap_or_default();
            self.store
                .put(&key, StoredRecord::new(element.clone(), remediations))
                .map_err(store_err)?;
            ctx.alerts.insert(cve_id, element);
        }

        if ctx.elements.is_empty() {
            debug!(agent = %ctx.agent.agent_id, "all matches already known");
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }
}

/// Deletion of every detection of a removed package.
pub struct EventDeleteInventory {
    store: Arc<InventoryStore>,
}

impl EventDeleteInventory {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

impl Stage for EventDeleteInventory {
    fn name(&self) -> &'static str {
        "EventDeleteInventory"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let removed = self
            .store
            .remove_prefix(&ctx.item_prefix())
            .map_err(store_err)?;

        for (key, record) in &removed {
            let element = deleted_element(key, record);
            let cve_id = cve_of_key(key).to_string();
            ctx.elements.insert(cve_id.clone(), element.clone());
            ctx.alerts.insert(cve_id, element);
        }

        if ctx.elements.is_empty() {
            debug!(agent = %ctx.agent.agent_id, item = %ctx.item_key(), "nothing to delete");
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }
}

/// Full diff of an OS scan against the stored OS detections.
pub struct ScanInventorySync {
    store: Arc<InventoryStore>,
}

impl ScanInventorySync {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

impl Stage for ScanInventorySync {
    fn name(&self) -> &'static str {
        "ScanInventorySync"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let prefix = ctx.item_prefix();
        let stored = self.store.scan_prefix(&prefix);
        let stored_cves: BTreeSet<String> = stored
            .iter()
            .map(|(key, _)| cve_of_key(key).to_string())
            .collect();

        // Detections that disappeared since the last scan.
        for (key, record) in &stored {
            let cve_id = cve_of_key(key).to_string();
            if ctx.elements.contains_key(&cve_id) {
                continue;
            }
            self.store.remove(key).map_err(store_err)?;
            let element = deleted_element(key, record);
            ctx.elements.insert(cve_id.clone(), element.clone());
            ctx.alerts.insert(cve_id, element);
        }

        // New detections; already-known ones are not transitions, while
        // replayed deletions pass through untouched.
        let cves: Vec<String> = ctx.elements.keys().cloned().collect();
        for cve_id in cves {
            if stored_cves.contains(&cve_id) {
                if ctx.match_conditions.remove(&cve_id).is_some() {
                    ctx.elements.remove(&cve_id);
                }
                continue;
            }
            let element = ctx.elements[&cve_id].clone();
            let key = ctx.element_id(&cve_id);
            let remediations = ctx.remediations.get(&cve_id).cloned().unwrap_or_default();
            self.store
                .put(&key, StoredRecord::new(element.clone(), remediations))
                .map_err(store_err)?;
            ctx.alerts.insert(cve_id, element);
        }

        if ctx.elements.is_empty() {
            debug!(agent = %ctx.agent.agent_id, "OS scan produced no transitions");
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }
}

/// Marks detections solved by a newly installed hotfix as DELETED.
pub struct CveSolvedInventorySync {
    store: Arc<InventoryStore>,
}

impl CveSolvedInventorySync {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

impl Stage for CveSolvedInventorySync {
    fn name(&self) -> &'static str {
        "CveSolvedInventorySync"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let hotfix = ctx.hotfix.hotfix.clone();
        if hotfix.is_empty() {
            return Ok(Flow::Halt);
        }

        let solved: Vec<(String, StoredRecord)> = self
            .store
            .scan_prefix(&ctx.agent_prefix())
            .into_iter()
            .filter(|(_, record)| record.remediations.iter().any(|r| r == &hotfix))
            .collect();

        for (key, record) in &solved {
            self.store.remove(key).map_err(store_err)?;
            let element = deleted_element(key, record);
            let cve_id = cve_of_key(key).to_string();
            ctx.elements.insert(cve_id.clone(), element.clone());
            ctx.alerts.insert(cve_id, element);
        }

        if ctx.elements.is_empty() {
            debug!(agent = %ctx.agent.agent_id, hotfix = %hotfix, "hotfix solves no stored detection");
            return Ok(Flow::Halt);
        }
        info!(agent = %ctx.agent.agent_id, hotfix = %hotfix, solved = ctx.elements.len(), "hotfix solved detections");
        Ok(Flow::Continue)
    }
}

/// Records the newly installed hotfix for the agent.
pub struct HotfixInsert {
    remediations: Arc<RemediationDataCache>,
}

impl HotfixInsert {
    pub fn new(remediations: Arc<RemediationDataCache>) -> Self {
        Self { remediations }
    }
}

impl Stage for HotfixInsert {
    fn name(&self) -> &'static str {
        "HotfixInsert"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        if ctx.hotfix.hotfix.is_empty() {
            return Err(ScanError::MalformedInput("hotfix insert without id".into()));
        }
        self.remediations
            .add_hotfix(&ctx.agent.agent_id, &ctx.hotfix.hotfix);
        Ok(Flow::Continue)
    }
}

/// Sweep dropping records owned by agents that no longer exist.
pub struct GlobalInventorySync {
    store: Arc<InventoryStore>,
    agents: Arc<dyn crate::sinks::AgentListProvider>,
    stop: StopFlag,
}

impl GlobalInventorySync {
    pub fn new(
        store: Arc<InventoryStore>,
        agents: Arc<dyn crate::sinks::AgentListProvider>,
        stop: StopFlag,
    ) -> Self {
        Self {
            store,
            agents,
            stop,
        }
    }
}

impl Stage for GlobalInventorySync {
    fn name(&self) -> &'static str {
        "GlobalInventorySync"
    }

    fn process(&self, _ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let live: BTreeSet<String> = self
            .agents
            .all_agents()
            .map_err(ScanError::FeedAccess)?
            .into_iter()
            .map(|agent| agent.agent_id)
            .collect();

        for agent_id in self.store.agent_ids() {
            if self.stop.is_stopped() {
                info!("global inventory sync interrupted");
                break;
            }
            if live.contains(&agent_id) {
                continue;
            }
            let removed = self
                .store
                .remove_prefix(&format!("{agent_id}_"))
                .map_err(store_err)?;
            info!(agent = %agent_id, records = removed.len(), "dropped inventory of absent agent");
        }
        Ok(Flow::Continue)
    }
}

/// Unconditional wipe of one agent's inventory partition.
pub struct CleanSingleAgentInventory {
    store: Arc<InventoryStore>,
}

impl CleanSingleAgentInventory {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

impl Stage for CleanSingleAgentInventory {
    fn name(&self) -> &'static str {
        "CleanSingleAgentInventory"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let removed = self
            .store
            .remove_prefix(&ctx.agent_prefix())
            .map_err(store_err)?;
        info!(agent = %ctx.agent.agent_id, records = removed.len(), "cleared agent inventory");
        Ok(Flow::Continue)
    }
}

/// Unconditional wipe of the whole store, agent by agent.
pub struct CleanAllAgentInventory {
    store: Arc<InventoryStore>,
    stop: StopFlag,
}

impl CleanAllAgentInventory {
    pub fn new(store: Arc<InventoryStore>, stop: StopFlag) -> Self {
        Self { store, stop }
    }
}

impl Stage for CleanAllAgentInventory {
    fn name(&self) -> &'static str {
        "CleanAllAgentInventory"
    }

    fn process(&self, _ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        for agent_id in self.store.agent_ids() {
            if self.stop.is_stopped() {
                info!("inventory wipe interrupted");
                break;
            }
            self.store
                .remove_prefix(&format!("{agent_id}_"))
                .map_err(store_err)?;
        }
        info!("cleared full inventory");
        Ok(Flow::Continue)
    }
}

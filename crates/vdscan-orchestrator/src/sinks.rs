//! Downstream collaborator seams.
//!
//! The report queue, the indexer transport, the global agent listing
//! service and the re-scan trigger all live outside this workspace; the
//! stages depend on these traits only. The in-memory implementations back
//! the test suite and the standalone binary.

use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use vdscan_core::model::AgentInfo;

/// Hands finished alert documents to the downstream report queue.
pub trait ReportDispatcher: Send + Sync {
    fn send(&self, alert: &Value) -> Result<()>;
}

/// Writes detection documents to the indexer.
pub trait IndexerConnector: Send + Sync {
    fn publish(&self, document: &Value) -> Result<()>;

    /// Single bulk write for all documents of one scan.
    fn publish_bulk(&self, documents: &[Value]) -> Result<()>;
}

/// Global agent listing service.
pub trait AgentListProvider: Send + Sync {
    fn all_agents(&self) -> Result<Vec<AgentInfo>>;
}

/// Requests a fresh inventory scan for one agent.
pub trait RescanDispatcher: Send + Sync {
    fn request_scan(&self, agent: &AgentInfo) -> Result<()>;
}

/// Shared stop predicate honored by sweep operations between agents.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Collects dispatched alerts in memory.
#[derive(Debug, Default)]
pub struct InMemoryReportQueue {
    alerts: Mutex<Vec<Value>>,
}

impl InMemoryReportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Value> {
        std::mem::take(&mut self.alerts.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().unwrap().is_empty()
    }
}

impl ReportDispatcher for InMemoryReportQueue {
    fn send(&self, alert: &Value) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Records indexer writes, keeping bulk batches distinguishable.
#[derive(Debug, Default)]
pub struct InMemoryIndexer {
    documents: Mutex<Vec<Value>>,
    bulk_batches: Mutex<Vec<Vec<Value>>>,
}

impl InMemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().unwrap().clone()
    }

    pub fn bulk_batches(&self) -> Vec<Vec<Value>> {
        self.bulk_batches.lock().unwrap().clone()
    }
}

impl IndexerConnector for InMemoryIndexer {
    fn publish(&self, document: &Value) -> Result<()> {
        self.documents.lock().unwrap().push(document.clone());
        Ok(())
    }

    fn publish_bulk(&self, documents: &[Value]) -> Result<()> {
        self.bulk_batches.lock().unwrap().push(documents.to_vec());
        Ok(())
    }
}

/// Fixed agent list.
#[derive(Debug, Default)]
pub struct StaticAgentList {
    agents: Vec<AgentInfo>,
}

impl StaticAgentList {
    pub fn new(agents: Vec<AgentInfo>) -> Self {
        Self { agents }
    }
}

impl AgentListProvider for StaticAgentList {
    fn all_agents(&self) -> Result<Vec<AgentInfo>> {
        Ok(self.agents.clone())
    }
}

/// Records re-scan requests.
#[derive(Debug, Default)]
pub struct RecordingRescanQueue {
    requests: Mutex<Vec<AgentInfo>>,
}

impl RecordingRescanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<AgentInfo> {
        self.requests.lock().unwrap().clone()
    }
}

impl RescanDispatcher for RecordingRescanQueue {
    fn request_scan(&self, agent: &AgentInfo) -> Result<()> {
        self.requests.lock().unwrap().push(agent.clone());
        Ok(())
    }
}

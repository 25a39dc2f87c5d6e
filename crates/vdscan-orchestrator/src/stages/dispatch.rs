//! Report dispatch and indexer sinks.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::sinks::{IndexerConnector, ReportDispatcher};
use crate::stages::{Flow, Stage};
use std::sync::Arc;
use tracing::{debug, warn};
use vdscan_core::config::PolicyConfig;

/// Hands every alert of the context to the report queue.
pub struct EventSendReport {
    dispatcher: Arc<dyn ReportDispatcher>,
}

impl EventSendReport {
    pub fn new(dispatcher: Arc<dyn ReportDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Stage for EventSendReport {
    fn name(&self) -> &'static str {
        "EventSendReport"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        for alert in ctx.alerts.values() {
            if let Err(err) = self.dispatcher.send(alert) {
                warn!(agent = %ctx.agent.agent_id, error = %err, "report dispatch failed");
            }
        }
        Ok(Flow::Continue)
    }
}

/// Same dispatch, for the integrity-clear notification.
pub struct ClearSendReport {
    dispatcher: Arc<dyn ReportDispatcher>,
}

impl ClearSendReport {
    pub fn new(dispatcher: Arc<dyn ReportDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Stage for ClearSendReport {
    fn name(&self) -> &'static str {
        "ClearSendReport"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        for alert in ctx.alerts.values() {
            if let Err(err) = self.dispatcher.send(alert) {
                warn!(agent = %ctx.agent.agent_id, error = %err, "clear dispatch failed");
            }
        }
        Ok(Flow::Continue)
    }
}

/// Writes each element individually to the indexer.
pub struct ResultIndexer {
    indexer: Arc<dyn IndexerConnector>,
    config: Arc<PolicyConfig>,
}

impl ResultIndexer {
    pub fn new(indexer: Arc<dyn IndexerConnector>, config: Arc<PolicyConfig>) -> Self {
        Self { indexer, config }
    }
}

impl Stage for ResultIndexer {
    fn name(&self) -> &'static str {
        "ResultIndexer"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        if !self.config.index_enabled() {
            debug!("indexing disabled by policy");
            return Ok(Flow::Continue);
        }
        for element in ctx.elements.values() {
            if let Err(err) = self.indexer.publish(element) {
                warn!(agent = %ctx.agent.agent_id, error = %err, "indexer write failed");
            }
        }
        Ok(Flow::Continue)
    }
}

/// Batches all elements of the context into one bulk write.
pub struct ArrayResultIndexer {
    indexer: Arc<dyn IndexerConnector>,
    config: Arc<PolicyConfig>,
}

impl ArrayResultIndexer {
    pub fn new(indexer: Arc<dyn IndexerConnector>, config: Arc<PolicyConfig>) -> Self {
        Self { indexer, config }
    }
}

impl Stage for ArrayResultIndexer {
    fn name(&self) -> &'static str {
        "ArrayResultIndexer"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        if !self.config.index_enabled() {
            debug!("indexing disabled by policy");
            return Ok(Flow::Continue);
        }
        if ctx.elements.is_empty() {
            return Ok(Flow::Continue);
        }
        let documents: Vec<serde_json::Value> = ctx.elements.values().cloned().collect();
        if let Err(err) = self.indexer.publish_bulk(&documents) {
            warn!(agent = %ctx.agent.agent_id, error = %err, "bulk indexer write failed");
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ScannerType;
    use crate::sinks::{InMemoryIndexer, InMemoryReportQueue};
    use serde_json::json;
    use vdscan_core::model::AgentInfo;

    fn ctx_with_data() -> ScanContext {
        let mut ctx = ScanContext::control(ScannerType::HotfixInsert, AgentInfo::default());
        ctx.elements.insert("CVE-2024-0001".into(), json!({"id": "a"}));
        ctx.elements.insert("CVE-2024-0002".into(), json!({"id": "b"}));
        ctx.alerts.insert("CVE-2024-0001".into(), json!({"id": "a"}));
        ctx
    }

    fn config(index_status: &str) -> Arc<PolicyConfig> {
        Arc::new(
            PolicyConfig::from_json(&json!({
                "vulnerability-detection": {"enabled": "yes", "index-status": index_status}
            }))
            .unwrap(),
        )
    }

    #[test]
    fn send_report_forwards_alerts() {
        let queue = Arc::new(InMemoryReportQueue::new());
        let stage = EventSendReport::new(queue.clone());
        let mut ctx = ctx_with_data();
        stage.process(&mut ctx).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn result_indexer_writes_individually() {
        let indexer = Arc::new(InMemoryIndexer::new());
        let stage = ResultIndexer::new(indexer.clone(), config("yes"));
        let mut ctx = ctx_with_data();
        stage.process(&mut ctx).unwrap();
        assert_eq!(indexer.documents().len(), 2);
        assert!(indexer.bulk_batches().is_empty());
    }

    #[test]
    fn array_indexer_writes_one_batch() {
        let indexer = Arc::new(InMemoryIndexer::new());
        let stage = ArrayResultIndexer::new(indexer.clone(), config("yes"));
        let mut ctx = ctx_with_data();
        stage.process(&mut ctx).unwrap();
        assert!(indexer.documents().is_empty());
        let batches = indexer.bulk_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn indexing_honors_policy_toggle() {
        let indexer = Arc::new(InMemoryIndexer::new());
        let mut ctx = ctx_with_data();
        ResultIndexer::new(indexer.clone(), config("no"))
            .process(&mut ctx)
            .unwrap();
        ArrayResultIndexer::new(indexer.clone(), config("no"))
            .process(&mut ctx)
            .unwrap();
        assert!(indexer.documents().is_empty());
        assert!(indexer.bulk_batches().is_empty());
    }
}

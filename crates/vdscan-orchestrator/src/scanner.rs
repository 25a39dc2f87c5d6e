//! Event intake facade.
//!
//! Owns the wiring between message normalization, context construction,
//! chain assembly and execution, plus the process metrics.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::factory::{self, ScanDependencies};
use crate::message::{InboundMessage, ScannerType};
use crate::metrics::{MetricsSnapshot, ScanMetrics};
use crate::stages::run_chain;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use vdscan_core::cpe::OsCpeMap;
use vdscan_core::model::AgentInfo;

pub struct VulnerabilityScanner {
    deps: ScanDependencies,
    cpe_map: Arc<OsCpeMap>,
    metrics: ScanMetrics,
}

impl VulnerabilityScanner {
    pub fn new(deps: ScanDependencies, cpe_map: Arc<OsCpeMap>) -> Self {
        Self {
            deps,
            cpe_map,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Ask long-running sweeps to wind down at the next agent boundary.
    pub fn request_stop(&self) {
        self.deps.stop.stop();
    }

    /// Process one raw inbound event.
    ///
    /// Errors are fatal to the event only; the caller decides whether to
    /// keep consuming. Events for the same agent must be handed in
    /// serially.
    pub fn handle_event(&self, raw: &Value) -> Result<(), ScanError> {
        if !self.deps.config.is_enabled() {
            debug!("vulnerability detection disabled by policy");
            return Ok(());
        }

        let msg = match InboundMessage::parse(raw) {
            Ok(msg) => msg,
            Err(err) => {
                self.metrics.event_dropped();
                error!(error = %err, "dropping malformed event");
                return Err(err);
            }
        };

        for scanner_type in msg.scanner_types() {
            if scanner_type == ScannerType::HotfixDelete {
                // No downstream work: the hotfix just stops counting as
                // installed.
                let hotfix = msg
                    .data()
                    .get("hotfix")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !hotfix.is_empty() {
                    self.deps
                        .remediation_cache
                        .remove_hotfix(&msg.agent().agent_id, hotfix);
                }
                self.metrics.event_processed();
                continue;
            }

            let mut ctx = match ScanContext::from_message(
                &msg,
                scanner_type,
                &self.deps.os_cache,
                &self.cpe_map,
            ) {
                Ok(ctx) => ctx,
                Err(err) => {
                    self.metrics.event_dropped();
                    error!(error = %err, "dropping undecodable event");
                    return Err(err);
                }
            };

            self.run(scanner_type, &mut ctx)?;
        }
        Ok(())
    }

    /// Run a control operation (cleanup, re-scan, global sync) that does
    /// not originate from a wire message.
    pub fn run_control(
        &self,
        scanner_type: ScannerType,
        agent: AgentInfo,
    ) -> Result<(), ScanError> {
        let mut ctx = ScanContext::control(scanner_type, agent);
        self.run(scanner_type, &mut ctx)
    }

    fn run(&self, scanner_type: ScannerType, ctx: &mut ScanContext) -> Result<(), ScanError> {
        let chain = factory::create(scanner_type, &self.deps);
        match run_chain(&chain, ctx) {
            Ok(()) => {
                self.metrics.event_processed();
                self.metrics.elements_indexed(ctx.elements.len() as u64);
                self.metrics.alerts_emitted(ctx.alerts.len() as u64);
                Ok(())
            }
            Err(err) => {
                self.metrics.event_dropped();
                error!(scanner_type = %scanner_type, error = %err, "dropping event");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{
        InMemoryIndexer, InMemoryReportQueue, RecordingRescanQueue, StaticAgentList, StopFlag,
    };
    use serde_json::json;
    use tempfile::TempDir;
    use vdscan_cache::{OsDataCache, RemediationDataCache};
    use vdscan_core::config::PolicyConfig;
    use vdscan_feed::cna::CnaMappings;
    use vdscan_feed::manager::InMemoryFeed;
    use vdscan_inventory::InventoryStore;

    fn scanner(temp: &TempDir, enabled: &str) -> VulnerabilityScanner {
        let deps = ScanDependencies {
            feed: Arc::new(InMemoryFeed::new()),
            mappings: Arc::new(CnaMappings::default()),
            config: Arc::new(
                PolicyConfig::from_json(&json!({
                    "vulnerability-detection": {"enabled": enabled, "index-status": "yes"}
                }))
                .unwrap(),
            ),
            store: Arc::new(InventoryStore::open(temp.path()).unwrap()),
            os_cache: Arc::new(OsDataCache::new(10)),
            remediation_cache: Arc::new(RemediationDataCache::new(10)),
            indexer: Arc::new(InMemoryIndexer::new()),
            reports: Arc::new(InMemoryReportQueue::new()),
            agents: Arc::new(StaticAgentList::new(vec![])),
            rescan: Arc::new(RecordingRescanQueue::new()),
            stop: StopFlag::new(),
        };
        VulnerabilityScanner::new(deps, Arc::new(OsCpeMap::default()))
    }

    #[test]
    fn malformed_event_is_counted_dropped() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner(&temp, "yes");
        let err = scanner
            .handle_event(&json!({"data_type": "dbsync_packages", "data": {}}))
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedInput(_)));
        assert_eq!(scanner.metrics().events_dropped, 1);
    }

    #[test]
    fn disabled_policy_skips_everything() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner(&temp, "no");
        scanner
            .handle_event(&json!({"data_type": "nonsense"}))
            .unwrap();
        assert_eq!(scanner.metrics().events_processed, 0);
        assert_eq!(scanner.metrics().events_dropped, 0);
    }

    #[test]
    fn hotfix_delete_clears_remediation_cache() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner(&temp, "yes");
        scanner
            .deps
            .remediation_cache
            .add_hotfix("001", "KB12345678");

        scanner
            .handle_event(&json!({
                "agent_info": {"agent_id": "001"},
                "data_type": "dbsync_hotfixes",
                "data": {"hotfix": "KB12345678"},
                "operation": "DELETED"
            }))
            .unwrap();

        assert!(!scanner
            .deps
            .remediation_cache
            .get("001")
            .hotfixes
            .contains("KB12345678"));
        assert_eq!(scanner.metrics().events_processed, 1);
    }

    #[test]
    fn no_match_event_processes_cleanly() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner(&temp, "yes");
        scanner
            .handle_event(&json!({
                "agent_info": {"agent_id": "001", "agent_name": "focal"},
                "data_type": "dbsync_packages",
                "data": {"name": "libgif7", "version": "5.1.9", "item_id": "item1", "format": "deb"},
                "operation": "INSERTED"
            }))
            .unwrap();
        assert_eq!(scanner.metrics().events_processed, 1);
        assert_eq!(scanner.metrics().elements_indexed, 0);
    }
}

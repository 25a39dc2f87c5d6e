//! Chain assembly per scanner type.
//!
//! The factory is a pure function from scanner type to stage chain; all
//! runtime state lives in the injected collaborators.

use crate::message::ScannerType;
use crate::sinks::{
    AgentListProvider, IndexerConnector, ReportDispatcher, RescanDispatcher, StopFlag,
};
use crate::stages::agent_list::{
    BuildAllAgentListContext, BuildSingleAgentListContext, ScanAgentList,
};
use crate::stages::details::{AlertClearBuilder, AlertDetailsBuilder, EventDetailsBuilder};
use crate::stages::dispatch::{ArrayResultIndexer, ClearSendReport, EventSendReport, ResultIndexer};
use crate::stages::inventory_sync::{
    CleanAllAgentInventory, CleanSingleAgentInventory, CveSolvedInventorySync,
    EventDeleteInventory, EventInsertInventory, GlobalInventorySync, HotfixInsert,
    ScanInventorySync,
};
use crate::stages::os_scanner::OsScan;
use crate::stages::package_scanner::PackageScan;
use crate::stages::Chain;
use std::sync::Arc;
use vdscan_cache::{OsDataCache, RemediationDataCache};
use vdscan_core::config::PolicyConfig;
use vdscan_feed::cna::CnaMappings;
use vdscan_feed::manager::DatabaseFeedManager;
use vdscan_inventory::InventoryStore;

/// Everything the stages need, wired once at startup.
#[derive(Clone)]
pub struct ScanDependencies {
    pub feed: Arc<dyn DatabaseFeedManager>,
    pub mappings: Arc<CnaMappings>,
    pub config: Arc<PolicyConfig>,
    pub store: Arc<InventoryStore>,
    pub os_cache: Arc<OsDataCache>,
    pub remediation_cache: Arc<RemediationDataCache>,
    pub indexer: Arc<dyn IndexerConnector>,
    pub reports: Arc<dyn ReportDispatcher>,
    pub agents: Arc<dyn AgentListProvider>,
    pub rescan: Arc<dyn RescanDispatcher>,
    pub stop: StopFlag,
}

/// Assemble the stage chain for one scanner type.
///
/// `HotfixDelete` has no downstream work; its chain is empty (the
/// remediation cache update happens during event intake).
pub fn create(scanner_type: ScannerType, deps: &ScanDependencies) -> Chain {
    match scanner_type {
        ScannerType::PackageInsert => vec![
            Arc::new(PackageScan::new(deps.feed.clone(), deps.mappings.clone())),
            Arc::new(EventInsertInventory::new(deps.store.clone())),
            Arc::new(EventDetailsBuilder::new(
                deps.feed.clone(),
                deps.store.clone(),
                deps.config.clone(),
            )),
            Arc::new(AlertDetailsBuilder::event_package(
                deps.feed.clone(),
                deps.config.clone(),
            )),
            Arc::new(EventSendReport::new(deps.reports.clone())),
            Arc::new(ResultIndexer::new(deps.indexer.clone(), deps.config.clone())),
        ],
        ScannerType::PackageDelete => vec![
            Arc::new(EventDeleteInventory::new(deps.store.clone())),
            Arc::new(AlertDetailsBuilder::event_package(
                deps.feed.clone(),
                deps.config.clone(),
            )),
            Arc::new(EventSendReport::new(deps.reports.clone())),
            Arc::new(ResultIndexer::new(deps.indexer.clone(), deps.config.clone())),
        ],
        ScannerType::Os => vec![
            Arc::new(OsScan::new(deps.feed.clone(), deps.mappings.clone())),
            Arc::new(ScanInventorySync::new(deps.store.clone())),
            Arc::new(EventDetailsBuilder::new(
                deps.feed.clone(),
                deps.store.clone(),
                deps.config.clone(),
            )),
            Arc::new(AlertDetailsBuilder::scan_os(
                deps.feed.clone(),
                deps.config.clone(),
            )),
            Arc::new(EventSendReport::new(deps.reports.clone())),
            Arc::new(ResultIndexer::new(deps.indexer.clone(), deps.config.clone())),
        ],
        ScannerType::HotfixInsert => vec![
            Arc::new(HotfixInsert::new(deps.remediation_cache.clone())),
            Arc::new(CveSolvedInventorySync::new(deps.store.clone())),
            Arc::new(AlertDetailsBuilder::cve_solved(
                deps.feed.clone(),
                deps.config.clone(),
            )),
            Arc::new(EventSendReport::new(deps.reports.clone())),
            Arc::new(ArrayResultIndexer::new(
                deps.indexer.clone(),
                deps.config.clone(),
            )),
        ],
        ScannerType::HotfixDelete => Vec::new(),
        ScannerType::IntegrityClear => vec![
            Arc::new(CleanSingleAgentInventory::new(deps.store.clone())),
            Arc::new(AlertClearBuilder::new(deps.config.clone())),
            Arc::new(ClearSendReport::new(deps.reports.clone())),
        ],
        ScannerType::CleanupSingleAgentData => {
            vec![Arc::new(CleanSingleAgentInventory::new(deps.store.clone()))]
        }
        ScannerType::CleanupAllAgentData => vec![Arc::new(CleanAllAgentInventory::new(
            deps.store.clone(),
            deps.stop.clone(),
        ))],
        ScannerType::ReScanAllAgents => vec![
            Arc::new(CleanAllAgentInventory::new(
                deps.store.clone(),
                deps.stop.clone(),
            )),
            Arc::new(BuildAllAgentListContext::new(deps.agents.clone())),
            Arc::new(ScanAgentList::new(deps.rescan.clone(), deps.stop.clone())),
        ],
        ScannerType::ReScanSingleAgent => vec![
            Arc::new(CleanSingleAgentInventory::new(deps.store.clone())),
            Arc::new(BuildSingleAgentListContext),
            Arc::new(ScanAgentList::new(deps.rescan.clone(), deps.stop.clone())),
        ],
        ScannerType::GlobalSyncInventory => vec![Arc::new(GlobalInventorySync::new(
            deps.store.clone(),
            deps.agents.clone(),
            deps.stop.clone(),
        ))],
    }
}

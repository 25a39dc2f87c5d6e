//! Re-scan fan-out stages.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::sinks::{AgentListProvider, RescanDispatcher, StopFlag};
use crate::stages::{Flow, Stage};
use std::sync::Arc;
use tracing::{info, warn};

/// Fills the context's agent list from the global listing service.
pub struct BuildAllAgentListContext {
    agents: Arc<dyn AgentListProvider>,
}

impl BuildAllAgentListContext {
    pub fn new(agents: Arc<dyn AgentListProvider>) -> Self {
        Self { agents }
    }
}

impl Stage for BuildAllAgentListContext {
    fn name(&self) -> &'static str {
        "BuildAllAgentListContext"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        ctx.agent_list = self.agents.all_agents().map_err(ScanError::FeedAccess)?;
        info!(agents = ctx.agent_list.len(), "built full agent list");
        Ok(Flow::Continue)
    }
}

/// Restricts the re-scan to the event's own agent.
pub struct BuildSingleAgentListContext;

impl Stage for BuildSingleAgentListContext {
    fn name(&self) -> &'static str {
        "BuildSingleAgentListContext"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        ctx.agent_list = vec![ctx.agent.clone()];
        Ok(Flow::Continue)
    }
}

/// Requests a fresh scan for every listed agent.
pub struct ScanAgentList {
    rescan: Arc<dyn RescanDispatcher>,
    stop: StopFlag,
}

impl ScanAgentList {
    pub fn new(rescan: Arc<dyn RescanDispatcher>, stop: StopFlag) -> Self {
        Self { rescan, stop }
    }
}

impl Stage for ScanAgentList {
    fn name(&self) -> &'static str {
        "ScanAgentList"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        for agent in &ctx.agent_list {
            if self.stop.is_stopped() {
                info!("agent re-scan interrupted");
                break;
            }
            if let Err(err) = self.rescan.request_scan(agent) {
                warn!(agent = %agent.agent_id, error = %err, "re-scan request failed");
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ScannerType;
    use crate::sinks::{RecordingRescanQueue, StaticAgentList};
    use vdscan_core::model::AgentInfo;

    fn agent(id: &str) -> AgentInfo {
        AgentInfo {
            agent_id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn all_agents_then_scan() {
        let provider = Arc::new(StaticAgentList::new(vec![agent("001"), agent("002")]));
        let rescan = Arc::new(RecordingRescanQueue::new());
        let mut ctx = ScanContext::control(ScannerType::ReScanAllAgents, AgentInfo::default());

        BuildAllAgentListContext::new(provider)
            .process(&mut ctx)
            .unwrap();
        assert_eq!(ctx.agent_list.len(), 2);

        ScanAgentList::new(rescan.clone(), StopFlag::new())
            .process(&mut ctx)
            .unwrap();
        assert_eq!(rescan.requests().len(), 2);
    }

    #[test]
    fn single_agent_list_uses_event_agent() {
        let mut ctx = ScanContext::control(ScannerType::ReScanSingleAgent, agent("007"));
        BuildSingleAgentListContext.process(&mut ctx).unwrap();
        assert_eq!(ctx.agent_list.len(), 1);
        assert_eq!(ctx.agent_list[0].agent_id, "007");
    }

    #[test]
    fn stop_flag_skips_remaining_agents() {
        let rescan = Arc::new(RecordingRescanQueue::new());
        let stop = StopFlag::new();
        stop.stop();

        let mut ctx = ScanContext::control(ScannerType::ReScanAllAgents, AgentInfo::default());
        ctx.agent_list = vec![agent("001"), agent("002")];
        ScanAgentList::new(rescan.clone(), stop)
            .process(&mut ctx)
            .unwrap();
        assert!(rescan.requests().is_empty());
    }
}

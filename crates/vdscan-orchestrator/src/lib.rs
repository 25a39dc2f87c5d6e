//! Scan orchestration for vdscan.
//!
//! This crate turns raw agent inventory events into detection documents
//! and lifecycle alerts:
//!
//! 1. **Normalize** - [`message::InboundMessage`] collapses the three wire
//!    forms into one typed view
//! 2. **Contextualize** - [`context::ScanContext`] freezes the per-event
//!    data every stage reads
//! 3. **Assemble** - [`factory::create`] picks the stage chain for the
//!    event's scanner type
//! 4. **Run** - [`stages::run_chain`] drives the context through the chain
//!    in one traversal
//!
//! [`scanner::VulnerabilityScanner`] wires the four steps together behind
//! a single `handle_event` entry point.

pub mod context;
pub mod error;
pub mod factory;
pub mod message;
pub mod metrics;
pub mod scanner;
pub mod sinks;
pub mod stages;

pub use context::{MatchCondition, ScanContext};
pub use error::ScanError;
pub use factory::ScanDependencies;
pub use message::{InboundMessage, MessageType, ScannerType};
pub use metrics::{MetricsSnapshot, ScanMetrics};
pub use scanner::VulnerabilityScanner;
pub use sinks::{
    AgentListProvider, IndexerConnector, InMemoryIndexer, InMemoryReportQueue,
    RecordingRescanQueue, ReportDispatcher, RescanDispatcher, StaticAgentList, StopFlag,
};

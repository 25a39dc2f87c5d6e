//! Inbound message normalization.
//!
//! Three carrier forms arrive on the wire and all collapse into the same
//! typed view:
//!
//! 1. **Delta** - incremental inventory sync (`dbsync_packages`,
//!    `dbsync_osinfo`, `dbsync_hotfixes`) with an explicit operation
//! 2. **Sync** - full-state sync (`data_type: "state"`) or an integrity
//!    clear (`data_type: "integrity_clear"`)
//! 3. **Action** - out-of-band fleet-management hooks (`deletePackage`,
//!    `deleteHotfix`)

use crate::error::ScanError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use vdscan_core::model::AgentInfo;

/// Which carrier form an event arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Delta,
    SyncState,
    IntegrityClear,
    DataJson,
}

/// Delta operation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Inserted,
    Modified,
    Deleted,
}

/// Event-class label that selects the orchestrator chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScannerType {
    PackageInsert,
    PackageDelete,
    Os,
    HotfixInsert,
    HotfixDelete,
    IntegrityClear,
    CleanupSingleAgentData,
    CleanupAllAgentData,
    ReScanAllAgents,
    ReScanSingleAgent,
    GlobalSyncInventory,
}

impl fmt::Display for ScannerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PackageInsert => "PackageInsert",
            Self::PackageDelete => "PackageDelete",
            Self::Os => "Os",
            Self::HotfixInsert => "HotfixInsert",
            Self::HotfixDelete => "HotfixDelete",
            Self::IntegrityClear => "IntegrityClear",
            Self::CleanupSingleAgentData => "CleanupSingleAgentData",
            Self::CleanupAllAgentData => "CleanupAllAgentData",
            Self::ReScanAllAgents => "ReScanAllAgents",
            Self::ReScanSingleAgent => "ReScanSingleAgent",
            Self::GlobalSyncInventory => "GlobalSyncInventory",
        };
        f.write_str(name)
    }
}

impl FromStr for ScannerType {
    type Err = ScanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PackageInsert" => Ok(Self::PackageInsert),
            "PackageDelete" => Ok(Self::PackageDelete),
            "Os" => Ok(Self::Os),
            "HotfixInsert" => Ok(Self::HotfixInsert),
            "HotfixDelete" => Ok(Self::HotfixDelete),
            "IntegrityClear" => Ok(Self::IntegrityClear),
            "CleanupSingleAgentData" => Ok(Self::CleanupSingleAgentData),
            "CleanupAllAgentData" => Ok(Self::CleanupAllAgentData),
            "ReScanAllAgents" => Ok(Self::ReScanAllAgents),
            "ReScanSingleAgent" => Ok(Self::ReScanSingleAgent),
            "GlobalSyncInventory" => Ok(Self::GlobalSyncInventory),
            other => Err(ScanError::InvalidScannerType(other.to_string())),
        }
    }
}

/// Which inventory table a message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Packages,
    OsInfo,
    Hotfixes,
}

/// A normalized inbound message, still carrying its raw payload.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Delta {
        agent: AgentInfo,
        kind: DataKind,
        operation: Operation,
        data: Value,
    },
    SyncState {
        agent: AgentInfo,
        kind: DataKind,
        attributes: Value,
    },
    IntegrityClear {
        agent: AgentInfo,
    },
    Action {
        agent: AgentInfo,
        scanner_type: ScannerType,
        data: Value,
    },
}

fn parse_agent(raw: &Value) -> AgentInfo {
    raw.get("agent_info")
        .and_then(|info| serde_json::from_value(info.clone()).ok())
        .unwrap_or_default()
}

fn parse_data_kind(tag: &str) -> Option<DataKind> {
    match tag {
        "dbsync_packages" | "syscollector_packages" => Some(DataKind::Packages),
        "dbsync_osinfo" | "syscollector_osinfo" => Some(DataKind::OsInfo),
        "dbsync_hotfixes" | "syscollector_hotfixes" => Some(DataKind::Hotfixes),
        _ => None,
    }
}

impl InboundMessage {
    /// Normalize one raw JSON event into its carrier form.
    pub fn parse(raw: &Value) -> Result<Self, ScanError> {
        let agent = parse_agent(raw);

        if let Some(action) = raw.get("action").and_then(Value::as_str) {
            let scanner_type = match action {
                "deletePackage" => ScannerType::PackageDelete,
                "deleteHotfix" => ScannerType::HotfixDelete,
                other => {
                    return Err(ScanError::MalformedInput(format!(
                        "unknown action '{other}'"
                    )))
                }
            };
            let data = raw.get("data").cloned().unwrap_or(Value::Null);
            return Ok(Self::Action {
                agent,
                scanner_type,
                data,
            });
        }

        let data_type = raw
            .get("data_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::MalformedInput("missing data_type".into()))?;

        match data_type {
            "integrity_clear" => Ok(Self::IntegrityClear { agent }),
            "state" => {
                let data = raw
                    .get("data")
                    .ok_or_else(|| ScanError::MalformedInput("state without data".into()))?;
                let attributes_type = data
                    .get("attributes_type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ScanError::MalformedInput("state without attributes_type".into())
                    })?;
                let kind = parse_data_kind(attributes_type).ok_or_else(|| {
                    ScanError::MalformedInput(format!(
                        "unknown attributes_type '{attributes_type}'"
                    ))
                })?;
                let attributes = data.get("attributes").cloned().unwrap_or(Value::Null);
                Ok(Self::SyncState {
                    agent,
                    kind,
                    attributes,
                })
            }
            delta => {
                let kind = parse_data_kind(delta).ok_or_else(|| {
                    ScanError::MalformedInput(format!("unknown data_type '{delta}'"))
                })?;
                let operation = match raw.get("operation").and_then(Value::as_str) {
                    Some("INSERTED") => Operation::Inserted,
                    Some("MODIFIED") => Operation::Modified,
                    Some("DELETED") => Operation::Deleted,
                    Some(other) => {
                        return Err(ScanError::MalformedInput(format!(
                            "unknown operation '{other}'"
                        )))
                    }
                    None => {
                        return Err(ScanError::MalformedInput("delta without operation".into()))
                    }
                };
                let data = raw.get("data").cloned().unwrap_or(Value::Null);
                Ok(Self::Delta {
                    agent,
                    kind,
                    operation,
                    data,
                })
            }
        }
    }

    pub fn agent(&self) -> &AgentInfo {
        match self {
            Self::Delta { agent, .. }
            | Self::SyncState { agent, .. }
            | Self::IntegrityClear { agent }
            | Self::Action { agent, .. } => agent,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Delta { .. } => MessageType::Delta,
            Self::SyncState { .. } => MessageType::SyncState,
            Self::IntegrityClear { .. } => MessageType::IntegrityClear,
            Self::Action { .. } => MessageType::DataJson,
        }
    }

    /// Scanner types this message triggers, in execution order.
    ///
    /// MODIFIED deltas expand to delete-then-insert; OS deletions are a
    /// no-op and yield nothing.
    pub fn scanner_types(&self) -> Vec<ScannerType> {
        match self {
            Self::Delta {
                kind, operation, ..
            } => match (kind, operation) {
                (DataKind::Packages, Operation::Inserted) => vec![ScannerType::PackageInsert],
                (DataKind::Packages, Operation::Deleted) => vec![ScannerType::PackageDelete],
                (DataKind::Packages, Operation::Modified) => {
                    vec![ScannerType::PackageDelete, ScannerType::PackageInsert]
                }
                (DataKind::OsInfo, Operation::Deleted) => vec![],
                (DataKind::OsInfo, _) => vec![ScannerType::Os],
                (DataKind::Hotfixes, Operation::Inserted) => vec![ScannerType::HotfixInsert],
                (DataKind::Hotfixes, Operation::Deleted) => vec![ScannerType::HotfixDelete],
                (DataKind::Hotfixes, Operation::Modified) => vec![ScannerType::HotfixInsert],
            },
            Self::SyncState { kind, .. } => match kind {
                DataKind::Packages => vec![ScannerType::PackageInsert],
                DataKind::OsInfo => vec![ScannerType::Os],
                DataKind::Hotfixes => vec![ScannerType::HotfixInsert],
            },
            Self::IntegrityClear { .. } => vec![ScannerType::IntegrityClear],
            Self::Action { scanner_type, .. } => vec![*scanner_type],
        }
    }

    /// Payload attributes for context construction.
    pub fn data(&self) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            Self::Delta { data, .. } | Self::Action { data, .. } => data,
            Self::SyncState { attributes, .. } => attributes,
            Self::IntegrityClear { .. } => &NULL,
        }
    }
}

//! The per-event scan context.
//!
//! Built once per (message, scanner type) pair and handed down the stage
//! chain. The identity fields are frozen at construction; `elements`,
//! `alerts` and the transient match bookkeeping are what the stages
//! populate.

use crate::error::ScanError;
use crate::message::{InboundMessage, MessageType, ScannerType};
use serde_json::Value;
use std::collections::BTreeMap;
use vdscan_cache::OsDataCache;
use vdscan_core::cpe::OsCpeMap;
use vdscan_core::model::{AgentInfo, Hotfix, Os, Package};
use vdscan_core::MANAGER_AGENT_ID;

/// How an observed version satisfied a candidate's version rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCondition {
    Equal(String),
    LessThan(String),
    LessThanOrEqual(String),
    DefaultStatus,
}

impl MatchCondition {
    /// Human-readable status line carried on alerts.
    pub fn describe(&self) -> String {
        match self {
            Self::Equal(version) => format!("affected at version {version}"),
            Self::LessThan(version) => format!("affected below {version}"),
            Self::LessThanOrEqual(version) => format!("affected up to {version}"),
            Self::DefaultStatus => "affected by default advisory status".to_string(),
        }
    }
}

/// Typed per-event view consumed by every stage.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub scanner_type: ScannerType,
    pub message_type: MessageType,
    pub agent: AgentInfo,
    pub os: Os,
    /// Computed CPE name; empty when the platform carries no template.
    pub os_cpe: String,
    pub package: Package,
    pub hotfix: Hotfix,
    /// CVE id -> detection record.
    pub elements: BTreeMap<String, Value>,
    /// CVE id -> alert record, populated only on presence transitions.
    pub alerts: BTreeMap<String, Value>,
    /// CVE id -> match condition; consumed by the alert builders.
    pub match_conditions: BTreeMap<String, MatchCondition>,
    /// CVE id -> remediating hotfixes observed at match time.
    pub remediations: BTreeMap<String, Vec<String>>,
    /// Agents to re-scan; filled only by the agent-list stages.
    pub agent_list: Vec<AgentInfo>,
}

fn field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// OS attributes arrive under syscollector names; map them onto the
/// descriptor. Note `version`/`release` are the kernel pair while the OS
/// pair is `os_version`/`os_release`.
fn decode_os(data: &Value) -> Os {
    Os {
        host_name: field(data, "hostname"),
        architecture: field(data, "architecture"),
        name: field(data, "os_name"),
        code_name: field(data, "os_codename"),
        major_version: field(data, "os_major"),
        minor_version: field(data, "os_minor"),
        patch: field(data, "os_patch"),
        build: field(data, "os_build"),
        platform: field(data, "os_platform"),
        version: field(data, "os_version"),
        release: field(data, "os_release"),
        display_version: field(data, "os_display_version"),
        sys_name: field(data, "sysname"),
        kernel_version: field(data, "version"),
        kernel_release: field(data, "release"),
    }
}

fn decode_package(data: &Value) -> Result<Package, ScanError> {
    serde_json::from_value(data.clone())
        .map_err(|err| ScanError::MalformedInput(format!("bad package attributes: {err}")))
}

fn decode_hotfix(data: &Value) -> Hotfix {
    Hotfix {
        hotfix: field(data, "hotfix"),
        scan_time: field(data, "scan_time"),
    }
}

impl ScanContext {
    /// Build the context for one scanner type derived from a message.
    ///
    /// OS events decode the descriptor, compute the CPE name and
    /// write-through the OS cache; every other event reads the agent's last
    /// known descriptor from the cache.
    pub fn from_message(
        msg: &InboundMessage,
        scanner_type: ScannerType,
        os_cache: &OsDataCache,
        cpe_map: &OsCpeMap,
    ) -> Result<Self, ScanError> {
        let agent = msg.agent().clone();
        let data = msg.data();

        let mut os_cpe = String::new();
        let mut package = Package::default();
        let mut hotfix = Hotfix::default();

        let os = match scanner_type {
            ScannerType::Os => {
                let os = decode_os(data);
                os_cpe = cpe_map.build(&os);
                os_cache.set(&agent.agent_id, os.clone());
                os
            }
            ScannerType::PackageInsert | ScannerType::PackageDelete => {
                package = decode_package(data)?;
                os_cache.get(&agent.agent_id).unwrap_or_default()
            }
            ScannerType::HotfixInsert | ScannerType::HotfixDelete => {
                hotfix = decode_hotfix(data);
                os_cache.get(&agent.agent_id).unwrap_or_default()
            }
            _ => os_cache.get(&agent.agent_id).unwrap_or_default(),
        };

        Ok(Self {
            scanner_type,
            message_type: msg.message_type(),
            agent,
            os,
            os_cpe,
            package,
            hotfix,
            elements: BTreeMap::new(),
            alerts: BTreeMap::new(),
            match_conditions: BTreeMap::new(),
            remediations: BTreeMap::new(),
            agent_list: Vec::new(),
        })
    }

    /// Context for control operations (cleanup, re-scan, global sync) that
    /// do not originate from a wire message.
    pub fn control(scanner_type: ScannerType, agent: AgentInfo) -> Self {
        Self {
            scanner_type,
            message_type: MessageType::DataJson,
            agent,
            os: Os::default(),
            os_cpe: String::new(),
            package: Package::default(),
            hotfix: Hotfix::default(),
            elements: BTreeMap::new(),
            alerts: BTreeMap::new(),
            match_conditions: BTreeMap::new(),
            remediations: BTreeMap::new(),
            agent_list: Vec::new(),
        }
    }

    pub fn is_manager(&self) -> bool {
        self.agent.agent_id == MANAGER_AGENT_ID
    }

    /// The item segment of inventory keys: the package item id for package
    /// flows, the OS name for OS flows.
    pub fn item_key(&self) -> &str {
        match self.scanner_type {
            ScannerType::Os => &self.os.name,
            _ => &self.package.item_id,
        }
    }

    /// Inventory key / element id for one CVE.
    pub fn element_id(&self, cve_id: &str) -> String {
        format!("{}_{}_{}", self.agent.agent_id, self.item_key(), cve_id)
    }

    /// Prefix owning every record of this agent.
    pub fn agent_prefix(&self) -> String {
        format!("{}_", self.agent.agent_id)
    }

    /// Prefix owning every record of the event's item on this agent.
    pub fn item_prefix(&self) -> String {
        format!("{}_{}_", self.agent.agent_id, self.item_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn os_cache() -> OsDataCache {
        OsDataCache::new(10)
    }

    fn package_msg() -> InboundMessage {
        InboundMessage::parse(&json!({
            "agent_info": {
                "agent_id": "001",
                "agent_ip": "192.168.33.20",
                "agent_name": "focal",
                "agent_version": "4.7.1"
            },
            "data_type": "dbsync_packages",
            "data": {
                "architecture": "amd64",
                "description": "library for GIF images library",
                "format": "deb",
                "groups": "libs",
                "item_id": "ec465b7eb5fa011a336e95614072e4c7f1a65a53",
                "name": "libgif7",
                "size": 72,
                "source": "giflib",
                "vendor": "Ubuntu Developers <ubuntu-devel-discuss@lists.ubuntu.com>",
                "version": "5.1.9",
                "install_time": "1577890801"
            },
            "operation": "INSERTED"
        }))
        .unwrap()
    }

    #[test]
    fn package_context_carries_cached_os() {
        let cache = os_cache();
        cache.set(
            "001",
            Os {
                platform: "ubuntu".into(),
                code_name: "focal".into(),
                ..Default::default()
            },
        );

        let ctx = ScanContext::from_message(
            &package_msg(),
            ScannerType::PackageInsert,
            &cache,
            &OsCpeMap::default(),
        )
        .unwrap();

        assert_eq!(ctx.package.name, "libgif7");
        assert_eq!(ctx.package.size, 72);
        assert_eq!(ctx.os.code_name, "focal");
        assert_eq!(
            ctx.element_id("CVE-2024-1234"),
            "001_ec465b7eb5fa011a336e95614072e4c7f1a65a53_CVE-2024-1234"
        );
        assert_eq!(
            ctx.item_prefix(),
            "001_ec465b7eb5fa011a336e95614072e4c7f1a65a53_"
        );
    }

    #[test]
    fn os_context_decodes_and_caches_descriptor() {
        let cache = os_cache();
        let cpe_map = OsCpeMap::from_json(&json!({
            "Microsoft Windows 10": "microsoft:windows_10_$(DISPLAY_VERSION):$(VERSION):::::"
        }))
        .unwrap();

        let msg = InboundMessage::parse(&json!({
            "agent_info": {"agent_id": "002", "agent_name": "Microsoft-10"},
            "data_type": "state",
            "data": {
                "attributes_type": "syscollector_osinfo",
                "attributes": {
                    "architecture": "x86_64",
                    "hostname": "DESKTOP-5RL9J34",
                    "os_build": "19045.3930",
                    "os_display_version": "22H2",
                    "os_major": "10",
                    "os_minor": "0",
                    "os_name": "Microsoft Windows 10 Pro",
                    "os_platform": "windows",
                    "os_release": "2009",
                    "os_version": "10.0.19045.3930"
                }
            }
        }))
        .unwrap();

        let ctx = ScanContext::from_message(&msg, ScannerType::Os, &cache, &cpe_map).unwrap();

        assert_eq!(ctx.os.name, "Microsoft Windows 10 Pro");
        assert_eq!(ctx.os.major_version, "10");
        assert_eq!(
            ctx.os_cpe,
            "cpe:/o:microsoft:windows_10_22h2:10.0.19045.3930:::::"
        );
        // Descriptor is now visible to subsequent events of that agent.
        assert_eq!(cache.get("002").unwrap().platform, "windows");
        assert_eq!(ctx.item_key(), "Microsoft Windows 10 Pro");
    }

    #[test]
    fn kernel_and_os_version_fields_do_not_collide() {
        let msg = InboundMessage::parse(&json!({
            "agent_info": {"agent_id": "007"},
            "data_type": "dbsync_osinfo",
            "data": {
                "os_name": "CentOS Linux",
                "os_platform": "centos",
                "os_version": "7.9.2009",
                "release": "6.2.0-39-generic",
                "version": "#40~22.04.1-Ubuntu SMP"
            },
            "operation": "INSERTED"
        }))
        .unwrap();

        let ctx = ScanContext::from_message(
            &msg,
            ScannerType::Os,
            &os_cache(),
            &OsCpeMap::default(),
        )
        .unwrap();

        assert_eq!(ctx.os.version, "7.9.2009");
        assert_eq!(ctx.os.kernel_release, "6.2.0-39-generic");
        assert_eq!(ctx.os.kernel_version, "#40~22.04.1-Ubuntu SMP");
    }

    #[test]
    fn manager_detection() {
        let ctx = ScanContext::control(
            ScannerType::CleanupSingleAgentData,
            AgentInfo {
                agent_id: "000".into(),
                ..Default::default()
            },
        );
        assert!(ctx.is_manager());
    }

    #[test]
    fn match_condition_descriptions() {
        assert_eq!(
            MatchCondition::LessThan("5.2.0".into()).describe(),
            "affected below 5.2.0"
        );
        assert_eq!(
            MatchCondition::Equal("5.1.9".into()).describe(),
            "affected at version 5.1.9"
        );
        assert_eq!(
            MatchCondition::DefaultStatus.describe(),
            "affected by default advisory status"
        );
    }
}

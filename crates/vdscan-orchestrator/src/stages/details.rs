//! Outbound envelope construction.
//!
//! One envelope shape serves detections and alerts; the builders differ in
//! which collection they enrich and in the extra fields alerts carry.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::message::ScannerType;
use crate::stages::{Flow, Stage};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;
use vdscan_core::config::PolicyConfig;
use vdscan_core::strings::{is_blank, round2, to_sentence_case};
use vdscan_feed::manager::DatabaseFeedManager;
use vdscan_feed::VulnerabilityDescription;
use vdscan_inventory::{InventoryStore, StoredRecord};

/// Version of the outbound document schema.
pub const SCHEMA_VERSION: &str = "1.0.0";

fn detected_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn category_of(scanner_type: ScannerType) -> &'static str {
    match scanner_type {
        ScannerType::Os => "OS",
        _ => "Packages",
    }
}

fn agent_section(ctx: &ScanContext, config: &PolicyConfig) -> Value {
    let mut agent = Map::new();
    agent.insert("id".into(), Value::String(ctx.agent.agent_id.clone()));
    agent.insert("name".into(), Value::String(ctx.agent.agent_name.clone()));
    agent.insert("type".into(), Value::String("wazuh".into()));
    agent.insert(
        "version".into(),
        Value::String(ctx.agent.agent_version.clone()),
    );
    if ctx.is_manager() && config.cluster_enabled {
        agent.insert(
            "ephemeral_id".into(),
            Value::String(config.cluster_node_name.clone()),
        );
    }
    Value::Object(agent)
}

fn host_section(ctx: &ScanContext) -> Value {
    let os = &ctx.os;
    let full = if os.platform == "darwin" {
        format!("{} {}", os.name, os.code_name)
    } else {
        format!("{} {}", os.name, os.version)
    };
    let os_type = if os.platform == "darwin" {
        "macos".to_string()
    } else {
        os.platform.to_lowercase()
    };
    json!({
        "os": {
            "name": os.name,
            "full": full,
            "platform": os.platform.to_lowercase(),
            "type": os_type,
            "version": os.dotted_version(),
            "kernel": os.kernel_release,
        }
    })
}

fn package_section(ctx: &ScanContext) -> Value {
    let package = &ctx.package;
    let mut section = Map::new();
    section.insert("name".into(), Value::String(package.name.clone()));
    section.insert("version".into(), Value::String(package.version.clone()));
    section.insert(
        "architecture".into(),
        Value::String(package.architecture.clone()),
    );
    section.insert(
        "description".into(),
        Value::String(package.description.clone()),
    );
    section.insert("size".into(), Value::from(package.size));
    section.insert("type".into(), Value::String(package.format.clone()));
    if !is_blank(&package.location) {
        section.insert("path".into(), Value::String(package.location.clone()));
    }
    Value::Object(section)
}

fn vulnerability_section(cve_id: &str, description: &VulnerabilityDescription, category: &str) -> Value {
    json!({
        "id": cve_id,
        "category": category,
        "classification": description.classification,
        "description": description.description,
        "enumeration": "CVE",
        "reference": description.reference,
        "scanner": {"vendor": "Wazuh"},
        "score": {
            "base": round2(description.score_base),
            "version": description.score_version,
        },
        "severity": to_sentence_case(&description.severity),
        "published_at": description.date_published,
        "detected_at": detected_at(),
    })
}

fn build_envelope(
    ctx: &ScanContext,
    cve_id: &str,
    operation: &str,
    description: &VulnerabilityDescription,
    config: &PolicyConfig,
) -> Value {
    let category = category_of(ctx.scanner_type);
    let mut data = Map::new();
    data.insert("agent".into(), agent_section(ctx, config));
    data.insert(
        "wazuh".into(),
        json!({
            "cluster": {"name": config.cluster_name},
            "schema": {"version": SCHEMA_VERSION},
        }),
    );
    data.insert("host".into(), host_section(ctx));
    if category == "Packages" && !ctx.package.name.is_empty() {
        data.insert("package".into(), package_section(ctx));
    }
    data.insert(
        "vulnerability".into(),
        vulnerability_section(cve_id, description, category),
    );

    json!({
        "operation": operation,
        "id": ctx.element_id(cve_id),
        "data": Value::Object(data),
    })
}

fn operation_of(record: &Value) -> String {
    record
        .get("operation")
        .and_then(Value::as_str)
        .unwrap_or("INSERTED")
        .to_string()
}

/// Enriches every element into the full outbound document and refreshes
/// the stored inventory record with it.
pub struct EventDetailsBuilder {
    feed: Arc<dyn DatabaseFeedManager>,
    store: Arc<InventoryStore>,
    config: Arc<PolicyConfig>,
}

impl EventDetailsBuilder {
    pub fn new(
        feed: Arc<dyn DatabaseFeedManager>,
        store: Arc<InventoryStore>,
        config: Arc<PolicyConfig>,
    ) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }
}

impl Stage for EventDetailsBuilder {
    fn name(&self) -> &'static str {
        "EventDetailsBuilder"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let cves: Vec<String> = ctx.elements.keys().cloned().collect();
        for cve_id in cves {
            let description = match self.feed.vulnerability_description(&cve_id) {
                Ok(found) => found.unwrap_or_default(),
                Err(err) => {
                    warn!(cve = %cve_id, error = %err, "description lookup failed, skipping event");
                    return Ok(Flow::Halt);
                }
            };

            let operation = operation_of(&ctx.elements[&cve_id]);
            let record = build_envelope(ctx, &cve_id, &operation, &description, &self.config);

            // Keep the persisted record in step with the last-built
            // document so delete flows can replay it.
            let key = ctx.element_id(&cve_id);
            if operation == "INSERTED" {
                if let Some(stored) = self.store.get(&key) {
                    self.store
                        .put(&key, StoredRecord::new(record.clone(), stored.remediations))
                        .map_err(ScanError::StoreAccess)?;
                }
            }

            ctx.elements.insert(cve_id, record);
        }
        Ok(Flow::Continue)
    }
}

/// Enriches alert entries; shared by the three alert-building stages.
pub struct AlertDetailsBuilder {
    feed: Arc<dyn DatabaseFeedManager>,
    config: Arc<PolicyConfig>,
    stage_name: &'static str,
}

impl AlertDetailsBuilder {
    pub fn event_package(
        feed: Arc<dyn DatabaseFeedManager>,
        config: Arc<PolicyConfig>,
    ) -> Self {
        Self {
            feed,
            config,
            stage_name: "EventPackageAlertBuilder",
        }
    }

    pub fn scan_os(feed: Arc<dyn DatabaseFeedManager>, config: Arc<PolicyConfig>) -> Self {
        Self {
            feed,
            config,
            stage_name: "ScanOsAlertBuilder",
        }
    }

    pub fn cve_solved(feed: Arc<dyn DatabaseFeedManager>, config: Arc<PolicyConfig>) -> Self {
        Self {
            feed,
            config,
            stage_name: "CveSolvedAlertBuilder",
        }
    }
}

impl Stage for AlertDetailsBuilder {
    fn name(&self) -> &'static str {
        self.stage_name
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let cves: Vec<String> = ctx.alerts.keys().cloned().collect();
        for cve_id in cves {
            let description = match self.feed.vulnerability_description(&cve_id) {
                Ok(found) => found.unwrap_or_default(),
                Err(err) => {
                    warn!(cve = %cve_id, error = %err, "description lookup failed, skipping event");
                    return Ok(Flow::Halt);
                }
            };

            let current = &ctx.alerts[&cve_id];
            let operation = operation_of(current);

            let mut alert = if current.get("data").is_some() {
                // Replayed stored document (delete flows): keep its data,
                // refresh the descriptive fields underneath.
                let mut alert = current.clone();
                if let Some(vulnerability) = alert
                    .get_mut("data")
                    .and_then(|data| data.get_mut("vulnerability"))
                {
                    let category = vulnerability
                        .get("category")
                        .and_then(Value::as_str)
                        .unwrap_or("Packages")
                        .to_string();
                    *vulnerability = vulnerability_section(&cve_id, &description, &category);
                }
                alert
            } else {
                build_envelope(ctx, &cve_id, &operation, &description, &self.config)
            };

            if let Some(condition) = ctx.match_conditions.get(&cve_id) {
                if let Some(vulnerability) = alert
                    .get_mut("data")
                    .and_then(|data| data.get_mut("vulnerability"))
                    .and_then(Value::as_object_mut)
                {
                    vulnerability
                        .insert("condition".into(), Value::String(condition.describe()));
                }
            }

            ctx.alerts.insert(cve_id, alert);
        }
        Ok(Flow::Continue)
    }
}

/// Synthesizes the single clear notification for an integrity clear.
pub struct AlertClearBuilder {
    config: Arc<PolicyConfig>,
}

impl AlertClearBuilder {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }
}

impl Stage for AlertClearBuilder {
    fn name(&self) -> &'static str {
        "AlertClearBuilder"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let alert = json!({
            "action": "clearVulnerabilities",
            "agent": {
                "id": ctx.agent.agent_id,
                "ip": ctx.agent.agent_ip,
                "name": ctx.agent.agent_name,
            },
            "wazuh": {
                "cluster": {"name": self.config.cluster_name},
                "schema": {"version": SCHEMA_VERSION},
            },
            "timestamp": detected_at(),
        });
        ctx.alerts.insert("integrity_clear".into(), alert);
        Ok(Flow::Continue)
    }
}

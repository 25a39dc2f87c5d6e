//! Vulnerability-detection policy document.
//!
//! A single JSON document configures the scanner. Unknown keys are ignored
//! so the document can be shared with other modules of the host product.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_yes() -> String {
    "yes".to_string()
}

fn default_lru_size() -> usize {
    1000
}

/// The `vulnerability-detection` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityDetection {
    /// String toggle, `"yes"` or `"no"`.
    #[serde(default = "default_yes")]
    pub enabled: String,
    /// Whether detections are forwarded to the indexer.
    #[serde(rename = "index-status", default = "default_yes")]
    pub index_status: String,
    #[serde(rename = "cti-url", default)]
    pub cti_url: String,
}

impl Default for VulnerabilityDetection {
    fn default() -> Self {
        Self {
            enabled: default_yes(),
            index_status: default_yes(),
            cti_url: String::new(),
        }
    }
}

/// Full policy document consumed by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(rename = "vulnerability-detection", default)]
    pub vulnerability_detection: VulnerabilityDetection,
    /// Capacity of the per-agent OS/remediation LRU caches.
    #[serde(rename = "osdataLRUSize", default = "default_lru_size")]
    pub osdata_lru_size: usize,
    #[serde(rename = "clusterEnabled", default)]
    pub cluster_enabled: bool,
    #[serde(rename = "clusterName", default)]
    pub cluster_name: String,
    #[serde(rename = "clusterNodeName", default)]
    pub cluster_node_name: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            vulnerability_detection: VulnerabilityDetection::default(),
            osdata_lru_size: default_lru_size(),
            cluster_enabled: false,
            cluster_name: String::new(),
            cluster_node_name: String::new(),
        }
    }
}

impl PolicyConfig {
    pub fn from_json(document: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(document.clone()).context("failed to parse policy document")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse policy file {}", path.display()))
    }

    /// Whether scanning is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.vulnerability_detection.enabled.eq_ignore_ascii_case("yes")
    }

    /// Whether detections should be written to the indexer.
    pub fn index_enabled(&self) -> bool {
        self.vulnerability_detection
            .index_status
            .eq_ignore_ascii_case("yes")
    }
}

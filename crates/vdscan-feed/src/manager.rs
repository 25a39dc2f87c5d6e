//! Feed query surface consumed by the scanning stages.

use crate::candidate::VulnerabilityCandidate;
use crate::description::VulnerabilityDescription;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use vdscan_core::model::{Os, Package};

/// Advisory namespace used when no resolution rule matches.
pub const DEFAULT_CNA: &str = "nvd";

/// An alternative identity for an observed package.
///
/// Translations cover vendor renaming and upstream-version re-expression;
/// each triple is evaluated against the feed independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageTranslation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    /// Empty means the observed version is kept.
    #[serde(default)]
    pub version: String,
}

/// Read-only query interface over the advisory feed database.
///
/// Candidate traversal is push-style: the feed calls the visitor once per
/// candidate until the visitor returns `true` (stop). Feed buffers stay
/// inside the implementation; visitors only see borrowed records.
pub trait DatabaseFeedManager: Send + Sync {
    /// Direct format -> CNA mapping (`deb` -> `ubuntu`). `None` = unknown.
    fn cna_name_by_format(&self, format: &str) -> Option<String>;

    /// Source-package -> CNA mapping, tried after format.
    fn cna_name_by_source(&self, source: &str) -> Option<String>;

    /// Longest-prefix match of the package name within a platform.
    fn cna_name_by_prefix(&self, package_name: &str, platform: &str) -> Option<String>;

    /// Substring match of the package name within a platform.
    fn cna_name_by_contains(&self, package_name: &str, platform: &str) -> Option<String>;

    /// Visit the candidates a CNA holds for a product, halting when the
    /// visitor returns `true`.
    fn visit_candidates(
        &self,
        cna_name: &str,
        product: &str,
        visitor: &mut dyn FnMut(&VulnerabilityCandidate) -> bool,
    ) -> Result<()>;

    /// Alternative identities for an observed package; empty means the
    /// observed attributes are authoritative.
    fn check_and_translate_package(
        &self,
        package: &Package,
        os: &Os,
    ) -> Result<Vec<PackageTranslation>>;

    /// Descriptive CVE fields for envelope enrichment.
    fn vulnerability_description(&self, cve_id: &str) -> Result<Option<VulnerabilityDescription>>;
}

/// JSON-document-backed feed used by the binary and the test suite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryFeed {
    /// format -> CNA.
    #[serde(default)]
    cna_by_format: HashMap<String, String>,
    /// source package -> CNA.
    #[serde(default)]
    cna_by_source: HashMap<String, String>,
    /// platform -> (name prefix -> CNA).
    #[serde(default)]
    cna_by_prefix: HashMap<String, HashMap<String, String>>,
    /// platform -> (name substring -> CNA).
    #[serde(default)]
    cna_by_contains: HashMap<String, HashMap<String, String>>,
    /// CNA -> product -> candidates.
    #[serde(default)]
    candidates: HashMap<String, HashMap<String, Vec<VulnerabilityCandidate>>>,
    /// CVE id -> description.
    #[serde(default)]
    descriptions: HashMap<String, VulnerabilityDescription>,
    /// package name -> alternative identities.
    #[serde(default)]
    translations: HashMap<String, Vec<PackageTranslation>>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(document: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(document.clone()).context("failed to parse feed document")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feed file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse feed file {}", path.display()))
    }

    pub fn with_format_cna(mut self, format: &str, cna: &str) -> Self {
        self.cna_by_format.insert(format.into(), cna.into());
        self
    }

    pub fn with_source_cna(mut self, source: &str, cna: &str) -> Self {
        self.cna_by_source.insert(source.into(), cna.into());
        self
    }

    pub fn with_prefix_cna(mut self, platform: &str, prefix: &str, cna: &str) -> Self {
        self.cna_by_prefix
            .entry(platform.into())
            .or_default()
            .insert(prefix.into(), cna.into());
        self
    }

    pub fn with_contains_cna(mut self, platform: &str, substring: &str, cna: &str) -> Self {
        self.cna_by_contains
            .entry(platform.into())
            .or_default()
            .insert(substring.into(), cna.into());
        self
    }

    pub fn with_candidate(
        mut self,
        cna: &str,
        product: &str,
        candidate: VulnerabilityCandidate,
    ) -> Self {
        self.candidates
            .entry(cna.into())
            .or_default()
            .entry(product.into())
            .or_default()
            .push(candidate);
        self
    }

    pub fn with_description(mut self, cve_id: &str, description: VulnerabilityDescription) -> Self {
        self.descriptions.insert(cve_id.into(), description);
        self
    }

    pub fn with_translation(mut self, package_name: &str, translation: PackageTranslation) -> Self {
        self.translations
            .entry(package_name.into())
            .or_default()
            .push(translation);
        self
    }
}

impl DatabaseFeedManager for InMemoryFeed {
    fn cna_name_by_format(&self, format: &str) -> Option<String> {
        self.cna_by_format.get(format).cloned()
    }

    fn cna_name_by_source(&self, source: &str) -> Option<String> {
        self.cna_by_source.get(source).cloned()
    }

    fn cna_name_by_prefix(&self, package_name: &str, platform: &str) -> Option<String> {
        self.cna_by_prefix.get(platform).and_then(|table| {
            table
                .iter()
                .filter(|(prefix, _)| package_name.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, cna)| cna.clone())
        })
    }

    fn cna_name_by_contains(&self, package_name: &str, platform: &str) -> Option<String> {
        self.cna_by_contains.get(platform).and_then(|table| {
            table
                .iter()
                .find(|(substring, _)| package_name.contains(substring.as_str()))
                .map(|(_, cna)| cna.clone())
        })
    }

    fn visit_candidates(
        &self,
        cna_name: &str,
        product: &str,
        visitor: &mut dyn FnMut(&VulnerabilityCandidate) -> bool,
    ) -> Result<()> {
        let Some(records) = self
            .candidates
            .get(cna_name)
            .and_then(|products| products.get(product))
        else {
            debug!(cna = cna_name, product, "no candidates in feed");
            return Ok(());
        };

        for candidate in records {
            if visitor(candidate) {
                break;
            }
        }
        Ok(())
    }

    fn check_and_translate_package(
        &self,
        package: &Package,
        _os: &Os,
    ) -> Result<Vec<PackageTranslation>> {
        Ok(self
            .translations
            .get(&package.name)
            .cloned()
            .unwrap_or_default())
    }

    fn vulnerability_description(&self, cve_id: &str) -> Result<Option<VulnerabilityDescription>> {
        Ok(self.descriptions.get(cve_id).cloned())
    }
}

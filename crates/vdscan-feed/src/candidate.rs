//! CNA advisory candidate records.

use serde::{Deserialize, Serialize};

/// Whether a rule (or a candidate by default) marks a version as affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Affected,
    Unaffected,
}

impl Default for Status {
    fn default() -> Self {
        Self::Unaffected
    }
}

/// One version range rule inside a candidate.
///
/// Exactly one of `less_than` / `less_than_or_equal` is set for range
/// rules; when neither is present the rule is an exact match on `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRule {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub version_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_or_equal: Option<String>,
    pub status: Status,
}

/// A CNA advisory candidate as stored in the feed, read-only to scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityCandidate {
    pub cve_id: String,
    #[serde(default)]
    pub default_status: Status,
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Present only when the advisory is scoped to one vendor's build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Hotfix identifiers that remediate this CVE (Windows advisories).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediations: Vec<String>,
    #[serde(default)]
    pub versions: Vec<VersionRule>,
}

impl VulnerabilityCandidate {
    /// The `"upstream"` pseudo-platform applies regardless of OS.
    pub fn applies_to_platform(&self, os_code_name: &str) -> bool {
        self.platforms
            .iter()
            .any(|p| p == "upstream" || p == os_code_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_feed_record() {
        let candidate: VulnerabilityCandidate = serde_json::from_value(json!({
            "cveId": "CVE-2024-1234",
            "defaultStatus": "unaffected",
            "platforms": ["upstream"],
            "versions": [
                {
                    "lessThan": "5.2.0",
                    "status": "affected",
                    "version": "0",
                    "versionType": "custom"
                }
            ]
        }))
        .unwrap();

        assert_eq!(candidate.cve_id, "CVE-2024-1234");
        assert_eq!(candidate.default_status, Status::Unaffected);
        assert_eq!(candidate.versions.len(), 1);
        assert_eq!(candidate.versions[0].less_than.as_deref(), Some("5.2.0"));
        assert!(candidate.versions[0].less_than_or_equal.is_none());
        assert_eq!(candidate.versions[0].status, Status::Affected);
        assert!(candidate.vendor.is_none());
        assert!(candidate.remediations.is_empty());
    }

    #[test]
    fn upstream_matches_any_platform() {
        let candidate = VulnerabilityCandidate {
            cve_id: "CVE-2024-1234".into(),
            default_status: Status::Unaffected,
            platforms: vec!["upstream".into()],
            vendor: None,
            remediations: vec![],
            versions: vec![],
        };
        assert!(candidate.applies_to_platform("jammy"));
        assert!(candidate.applies_to_platform(""));
    }

    #[test]
    fn platform_gate_requires_code_name() {
        let candidate = VulnerabilityCandidate {
            cve_id: "CVE-2024-1234".into(),
            default_status: Status::Unaffected,
            platforms: vec!["focal".into()],
            vendor: None,
            remediations: vec![],
            versions: vec![],
        };
        assert!(candidate.applies_to_platform("focal"));
        assert!(!candidate.applies_to_platform("jammy"));
    }
}

//! Descriptive CVE fields, consumed verbatim from the feed.

use serde::{Deserialize, Serialize};

/// Descriptive information attached to one CVE id.
///
/// Scores and severities are published values; the scanner copies them
/// into outbound envelopes without recomputation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityDescription {
    #[serde(default)]
    pub assigner_short_name: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub cwe_id: String,
    #[serde(default)]
    pub date_published: String,
    #[serde(default)]
    pub date_updated: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub score_base: f64,
    #[serde(default)]
    pub score_version: String,
    #[serde(default)]
    pub severity: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_records_default_missing_fields() {
        let description: VulnerabilityDescription = serde_json::from_value(json!({
            "description": "Heap overflow in gif parsing.",
            "scoreBase": 8.3,
            "scoreVersion": "3.1",
            "severity": "HIGH",
            "datePublished": "2024-02-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(description.score_base, 8.3);
        assert_eq!(description.severity, "HIGH");
        assert_eq!(description.classification, "");
        assert_eq!(description.reference, "");
    }
}

//! CNA name mapping tables.
//!
//! A resolved CNA name is still generic (`alas`, `suse`); the mapping
//! tables specialize it to the advisory namespace that actually indexes
//! the records, e.g. `alas` on Amazon Linux 2018 becomes `alas_1`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vdscan_core::model::Os;

/// The configured CNA mapping document.
///
/// - `cnaMapping` carries a template per CNA with `$(MAJOR_VERSION)` and
///   `$(PLATFORM)` placeholders.
/// - `majorVersionEquivalence` rewrites the OS major version per platform
///   before substitution (e.g. `amzn/2018` -> `1`).
/// - `platformEquivalence` rewrites the platform tag (e.g. `sled` ->
///   `suse_desktop`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CnaMappings {
    #[serde(rename = "cnaMapping", default)]
    cna_mapping: HashMap<String, String>,
    #[serde(rename = "majorVersionEquivalence", default)]
    major_version_equivalence: HashMap<String, HashMap<String, String>>,
    #[serde(rename = "platformEquivalence", default)]
    platform_equivalence: HashMap<String, String>,
}

impl CnaMappings {
    pub fn from_json(document: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(document.clone()).context("failed to parse CNA mapping document")
    }

    /// Specialize a resolved CNA name for the observed OS.
    ///
    /// CNAs without a template pass through untouched.
    pub fn apply(&self, cna_name: &str, os: &Os) -> String {
        let Some(template) = self.cna_mapping.get(cna_name) else {
            return cna_name.to_string();
        };

        let platform = self
            .platform_equivalence
            .get(&os.platform)
            .map(String::as_str)
            .unwrap_or(&os.platform);

        let major_version = self
            .major_version_equivalence
            .get(&os.platform)
            .and_then(|table| table.get(&os.major_version))
            .map(String::as_str)
            .unwrap_or(&os.major_version);

        template
            .replace("$(MAJOR_VERSION)", major_version)
            .replace("$(PLATFORM)", platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mappings() -> CnaMappings {
        CnaMappings::from_json(&json!({
            "cnaMapping": {
                "alas": "alas_$(MAJOR_VERSION)",
                "alma": "alma_$(MAJOR_VERSION)",
                "redhat": "redhat_$(MAJOR_VERSION)",
                "suse": "$(PLATFORM)_$(MAJOR_VERSION)"
            },
            "majorVersionEquivalence": {
                "amzn": {
                    "2018": "1"
                }
            },
            "platformEquivalence": {
                "sled": "suse_desktop",
                "sles": "suse_server"
            }
        }))
        .unwrap()
    }

    fn os(platform: &str, major: &str) -> Os {
        Os {
            platform: platform.into(),
            major_version: major.into(),
            ..Default::default()
        }
    }

    #[test]
    fn alma_major_substitution() {
        assert_eq!(mappings().apply("alma", &os("alma", "8")), "alma_8");
    }

    #[test]
    fn amzn_major_equivalence() {
        let tables = mappings();
        assert_eq!(tables.apply("alas", &os("amzn", "2018")), "alas_1");
        assert_eq!(tables.apply("alas", &os("amzn", "2")), "alas_2");
        assert_eq!(tables.apply("alas", &os("amzn", "2022")), "alas_2022");
    }

    #[test]
    fn suse_platform_equivalence() {
        let tables = mappings();
        assert_eq!(tables.apply("suse", &os("sled", "15")), "suse_desktop_15");
        assert_eq!(tables.apply("suse", &os("sles", "15")), "suse_server_15");
    }

    #[test]
    fn redhat_major_substitution() {
        assert_eq!(mappings().apply("redhat", &os("rhel", "7")), "redhat_7");
    }

    #[test]
    fn unmapped_cna_passes_through() {
        assert_eq!(mappings().apply("nvd", &os("ubuntu", "22")), "nvd");
    }

    #[test]
    fn substitution_leaves_no_placeholders() {
        let tables = mappings();
        for (platform, major) in [("amzn", "2018"), ("sled", "15"), ("alma", "9")] {
            for cna in ["alas", "alma", "redhat", "suse"] {
                let name = tables.apply(cna, &os(platform, major));
                assert!(!name.contains("$("), "unresolved placeholder in {name}");
            }
        }
    }
}

//! CPE name templating for OS-level advisory matching.
//!
//! Each supported platform carries a template string in the OS CPE map,
//! e.g. `microsoft:windows_10_$(DISPLAY_VERSION):$(VERSION):::::`. The map
//! is keyed either by a prefix of the reported OS name (Windows products)
//! or by the platform tag (Linux distributions).

use crate::model::Os;
use anyhow::{Context, Result};
use std::collections::HashMap;

const CPE_OS_PREFIX: &str = "cpe:/o:";

/// Per-platform CPE template table, loaded from a JSON object.
#[derive(Debug, Clone, Default)]
pub struct OsCpeMap {
    templates: HashMap<String, String>,
}

impl OsCpeMap {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn from_json(document: &serde_json::Value) -> Result<Self> {
        let templates: HashMap<String, String> =
            serde_json::from_value(document.clone()).context("failed to parse OS CPE map")?;
        Ok(Self { templates })
    }

    /// Resolve the template for an OS descriptor.
    ///
    /// Lookup order: longest key that prefixes the OS name, then the exact
    /// platform tag. No entry means the OS has no CPE and cannot be scanned
    /// at OS level.
    fn template_for(&self, os: &Os) -> Option<&str> {
        let by_name = self
            .templates
            .iter()
            .filter(|(key, _)| !os.name.is_empty() && os.name.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, template)| template.as_str());

        by_name.or_else(|| self.templates.get(&os.platform).map(String::as_str))
    }

    /// Build the `cpe:/o:`-prefixed CPE name for an OS descriptor.
    ///
    /// Returns an empty string when no template exists; substituted values
    /// are lower-cased per CPE conventions.
    pub fn build(&self, os: &Os) -> String {
        let Some(template) = self.template_for(os) else {
            return String::new();
        };

        let body = template
            .replace("$(MAJOR_VERSION)", &os.major_version)
            .replace("$(VERSION)", &os.version)
            .replace("$(DISPLAY_VERSION)", &os.display_version)
            .replace("$(PLATFORM)", &os.platform)
            .to_lowercase();

        format!("{CPE_OS_PREFIX}{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(rules: serde_json::Value) -> OsCpeMap {
        OsCpeMap::from_json(&rules).unwrap()
    }

    #[test]
    fn windows_10_by_name_prefix() {
        let cpe_map = map(json!({
            "Microsoft Windows 10": "microsoft:windows_10_$(DISPLAY_VERSION):$(VERSION):::::"
        }));
        let os = Os {
            name: "Microsoft Windows 10 Pro".into(),
            platform: "windows".into(),
            major_version: "10".into(),
            minor_version: "0".into(),
            build: "19045.3930".into(),
            version: "10.0.19045.3930".into(),
            display_version: "22H2".into(),
            ..Default::default()
        };
        assert_eq!(
            cpe_map.build(&os),
            "cpe:/o:microsoft:windows_10_22h2:10.0.19045.3930:::::"
        );
    }

    #[test]
    fn centos_by_platform_tag() {
        let cpe_map = map(json!({
            "centos": "redhat:enterprise_linux:$(MAJOR_VERSION)"
        }));
        let os = Os {
            name: "CentOS Linux".into(),
            platform: "centos".into(),
            major_version: "7".into(),
            ..Default::default()
        };
        assert_eq!(cpe_map.build(&os), "cpe:/o:redhat:enterprise_linux:7");
    }

    #[test]
    fn tumbleweed_template_without_placeholders() {
        let cpe_map = map(json!({
            "opensuse-tumbleweed": "opensuse:tumbleweed"
        }));
        let os = Os {
            name: "openSUSE Tumbleweed".into(),
            platform: "opensuse-tumbleweed".into(),
            ..Default::default()
        };
        assert_eq!(cpe_map.build(&os), "cpe:/o:opensuse:tumbleweed");
    }

    #[test]
    fn longest_name_prefix_wins() {
        let cpe_map = map(json!({
            "Microsoft Windows": "microsoft:windows",
            "Microsoft Windows Server 2022": "microsoft:windows_server_2022"
        }));
        let os = Os {
            name: "Microsoft Windows Server 2022 Datacenter".into(),
            platform: "windows".into(),
            ..Default::default()
        };
        assert_eq!(cpe_map.build(&os), "cpe:/o:microsoft:windows_server_2022");
    }

    #[test]
    fn unmapped_platform_yields_empty() {
        let cpe_map = map(json!({"centos": "redhat:enterprise_linux:$(MAJOR_VERSION)"}));
        let os = Os {
            name: "Some BSD".into(),
            platform: "freebsd".into(),
            ..Default::default()
        };
        assert_eq!(cpe_map.build(&os), "");
    }
}

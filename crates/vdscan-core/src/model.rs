//! Inventory records as reported by fleet agents.

use serde::{Deserialize, Serialize};

/// Identity of the agent an event originated from.
///
/// The manager itself reports under the reserved id `"000"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_ip: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub agent_version: String,
}

/// Operating-system descriptor for one agent.
///
/// Field access never fails: attributes the agent did not report stay empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Os {
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code_name: String,
    #[serde(default)]
    pub major_version: String,
    #[serde(default)]
    pub minor_version: String,
    #[serde(default)]
    pub patch: String,
    #[serde(default)]
    pub build: String,
    /// Lower-case platform tag (`windows`, `ubuntu`, `rhel`, `amzn`, ...).
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub display_version: String,
    #[serde(default)]
    pub sys_name: String,
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub kernel_release: String,
}

impl Os {
    /// Dotted join of major, minor, patch and build, skipping empty segments.
    pub fn dotted_version(&self) -> String {
        let mut out = String::new();
        for segment in [
            &self.major_version,
            &self.minor_version,
            &self.patch,
            &self.build,
        ] {
            if segment.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }
}

/// Installed-package attributes from the agent inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub install_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub groups: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub multiarch: String,
    #[serde(default)]
    pub source: String,
    /// Package format tag (`deb`, `rpm`, `pypi`, `pacman`, `win`, ...).
    #[serde(default)]
    pub format: String,
    /// Content hash that uniquely names the package within an agent.
    #[serde(default)]
    pub item_id: String,
}

impl Package {
    /// A vendor is unknown when the agent reported nothing or the
    /// single-space sentinel some collectors emit.
    pub fn vendor_is_unknown(&self) -> bool {
        self.vendor.trim().is_empty()
    }
}

/// An operating-system hotfix (primarily Windows KB identifiers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotfix {
    #[serde(default)]
    pub hotfix: String,
    #[serde(default)]
    pub scan_time: String,
}

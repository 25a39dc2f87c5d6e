//! Core data model and support routines for the vdscan workspace.
//!
//! This crate holds everything the scanning pipeline shares but that has no
//! behavior of its own:
//!
//! - **Model** - agent identity, OS descriptors, package and hotfix records
//! - **Config** - the vulnerability-detection policy document
//! - **CPE** - per-platform CPE name templating for OS-level matching
//! - **Versions** - version comparison across the schemes advisory feeds use

pub mod config;
pub mod cpe;
pub mod model;
pub mod strings;
pub mod version;

pub use config::PolicyConfig;
pub use cpe::OsCpeMap;
pub use model::{AgentInfo, Hotfix, Os, Package};
pub use version::{compare_versions, VersionScheme};

/// Agent id reserved for the manager node itself.
pub const MANAGER_AGENT_ID: &str = "000";

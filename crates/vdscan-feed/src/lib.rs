//! Advisory-feed access for the vdscan pipeline.
//!
//! The feed itself (ingestion, storage, updates) lives outside this
//! workspace; scanning only needs a query surface:
//!
//! - **Candidates** - CNA advisory records with version range rules
//! - **Descriptions** - descriptive CVE fields (CVSS, severity, dates)
//! - **CNA resolution** - mapping an observed package to the advisory
//!   namespace that owns its CVE records
//!
//! [`DatabaseFeedManager`] is the seam the pipeline stages depend on;
//! [`InMemoryFeed`] is the bundled implementation backed by JSON documents.

pub mod candidate;
pub mod cna;
pub mod description;
pub mod manager;

pub use candidate::{Status, VersionRule, VulnerabilityCandidate};
pub use cna::CnaMappings;
pub use description::VulnerabilityDescription;
pub use manager::{DatabaseFeedManager, InMemoryFeed, PackageTranslation, DEFAULT_CNA};

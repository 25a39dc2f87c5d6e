//! OS-level advisory matching, keyed by the computed CPE name.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::stages::matching::{evaluate_candidate, CandidateOutcome};
use crate::stages::{Flow, Stage};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use vdscan_feed::cna::CnaMappings;
use vdscan_feed::manager::{DatabaseFeedManager, DEFAULT_CNA};

/// Matches an OS descriptor against the advisories indexed under its CPE.
///
/// Structural twin of the package scanner: same gates and version rules,
/// but the CPE name selects the candidates and the OS version feeds the
/// range evaluation. Zero matches do not halt the chain - the inventory
/// sync still has to clear detections that no longer apply.
pub struct OsScan {
    feed: Arc<dyn DatabaseFeedManager>,
    mappings: Arc<CnaMappings>,
}

impl OsScan {
    pub fn new(feed: Arc<dyn DatabaseFeedManager>, mappings: Arc<CnaMappings>) -> Self {
        Self { feed, mappings }
    }
}

impl Stage for OsScan {
    fn name(&self) -> &'static str {
        "OsScan"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        if ctx.os_cpe.is_empty() {
            debug!(platform = %ctx.os.platform, "no CPE template for platform, skipping OS scan");
            return Ok(Flow::Halt);
        }

        let cna_name = self.mappings.apply(DEFAULT_CNA, &ctx.os);
        debug!(cpe = %ctx.os_cpe, cna = %cna_name, "scanning OS");

        let code_name = ctx.os.code_name.clone();
        let observed_version = ctx.os.version.clone();
        let mut matches = Vec::new();
        let mut clean: BTreeSet<String> = BTreeSet::new();

        let visit = self.feed.visit_candidates(&cna_name, &ctx.os_cpe, &mut |candidate| {
            if clean.contains(&candidate.cve_id) {
                return false;
            }
            match evaluate_candidate(candidate, &observed_version, &code_name, "") {
                CandidateOutcome::Match(condition) => {
                    matches.push((
                        candidate.cve_id.clone(),
                        condition,
                        candidate.remediations.clone(),
                    ));
                }
                CandidateOutcome::Clean => {
                    clean.insert(candidate.cve_id.clone());
                }
                CandidateOutcome::NoMatch => {}
            }
            false
        });

        if let Err(err) = visit {
            warn!(cpe = %ctx.os_cpe, error = %err, "feed access failed, skipping event");
            return Ok(Flow::Halt);
        }

        for (cve_id, condition, remediations) in matches {
            if clean.contains(&cve_id) || ctx.elements.contains_key(&cve_id) {
                continue;
            }
            let id = ctx.element_id(&cve_id);
            ctx.elements
                .insert(cve_id.clone(), json!({"operation": "INSERTED", "id": id}));
            ctx.match_conditions.insert(cve_id.clone(), condition);
            if !remediations.is_empty() {
                ctx.remediations.insert(cve_id, remediations);
            }
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MatchCondition;
    use crate::message::{InboundMessage, ScannerType};
    use serde_json::json;
    use vdscan_cache::OsDataCache;
    use vdscan_core::cpe::OsCpeMap;
    use vdscan_feed::candidate::{Status, VersionRule, VulnerabilityCandidate};
    use vdscan_feed::manager::InMemoryFeed;

    const CVE: &str = "CVE-2024-9999";

    fn windows_ctx(cpe_map: &OsCpeMap) -> ScanContext {
        let msg = InboundMessage::parse(&json!({
            "agent_info": {"agent_id": "002", "agent_name": "Microsoft-10"},
            "data_type": "state",
            "data": {
                "attributes_type": "syscollector_osinfo",
                "attributes": {
                    "os_build": "19045.3930",
                    "os_codename": "upstream",
                    "os_display_version": "22H2",
                    "os_major": "10",
                    "os_minor": "0",
                    "os_name": "Microsoft Windows 10 Pro",
                    "os_platform": "windows",
                    "os_version": "10.0.19045.3930"
                }
            }
        }))
        .unwrap();
        ScanContext::from_message(&msg, ScannerType::Os, &OsDataCache::new(10), cpe_map).unwrap()
    }

    fn windows_candidate() -> VulnerabilityCandidate {
        VulnerabilityCandidate {
            cve_id: CVE.into(),
            default_status: Status::Unaffected,
            platforms: vec!["upstream".into()],
            vendor: None,
            remediations: vec!["KB12345678".into()],
            versions: vec![VersionRule {
                version: "0".into(),
                version_type: "custom".into(),
                less_than: Some("10.0.19046".into()),
                less_than_or_equal: None,
                status: Status::Affected,
            }],
        }
    }

    fn cpe_map() -> OsCpeMap {
        OsCpeMap::from_json(&json!({
            "Microsoft Windows 10": "microsoft:windows_10_$(DISPLAY_VERSION):$(VERSION):::::"
        }))
        .unwrap()
    }

    #[test]
    fn os_match_is_keyed_by_cpe() {
        let cpe_map = cpe_map();
        let mut ctx = windows_ctx(&cpe_map);
        let feed = InMemoryFeed::new().with_candidate("nvd", &ctx.os_cpe.clone(), windows_candidate());

        let stage = OsScan::new(Arc::new(feed), Arc::new(CnaMappings::default()));
        assert_eq!(stage.process(&mut ctx).unwrap(), Flow::Continue);

        assert_eq!(ctx.elements.len(), 1);
        assert_eq!(
            ctx.elements[CVE]["id"],
            "002_Microsoft Windows 10 Pro_CVE-2024-9999"
        );
        assert_eq!(
            ctx.match_conditions[CVE],
            MatchCondition::LessThan("10.0.19046".into())
        );
        assert_eq!(ctx.remediations[CVE], vec!["KB12345678".to_string()]);
    }

    #[test]
    fn missing_cpe_template_halts() {
        let mut ctx = windows_ctx(&OsCpeMap::default());
        assert!(ctx.os_cpe.is_empty());

        let stage = OsScan::new(
            Arc::new(InMemoryFeed::new()),
            Arc::new(CnaMappings::default()),
        );
        assert_eq!(stage.process(&mut ctx).unwrap(), Flow::Halt);
    }

    #[test]
    fn zero_matches_still_continue_for_sync() {
        let cpe_map = cpe_map();
        let mut ctx = windows_ctx(&cpe_map);
        let stage = OsScan::new(
            Arc::new(InMemoryFeed::new()),
            Arc::new(CnaMappings::default()),
        );
        assert_eq!(stage.process(&mut ctx).unwrap(), Flow::Continue);
        assert!(ctx.elements.is_empty());
    }
}

//! Package-level advisory matching.

use crate::context::ScanContext;
use crate::error::ScanError;
use crate::stages::matching::{evaluate_candidate, CandidateOutcome};
use crate::stages::{Flow, Stage};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use vdscan_core::model::{Os, Package};
use vdscan_feed::cna::CnaMappings;
use vdscan_feed::manager::{DatabaseFeedManager, PackageTranslation, DEFAULT_CNA};

/// Matches an inserted package against its CNA's advisory candidates.
pub struct PackageScan {
    feed: Arc<dyn DatabaseFeedManager>,
    mappings: Arc<CnaMappings>,
}

impl PackageScan {
    pub fn new(feed: Arc<dyn DatabaseFeedManager>, mappings: Arc<CnaMappings>) -> Self {
        Self { feed, mappings }
    }

    /// Resolve the advisory namespace for an observed package.
    ///
    /// First hit wins: format, source, name prefix, name substring, then
    /// the default CNA.
    fn resolve_cna(&self, package: &Package, os: &Os) -> String {
        self.feed
            .cna_name_by_format(&package.format)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.feed
                    .cna_name_by_source(&package.source)
                    .filter(|name| !name.is_empty())
            })
            .or_else(|| self.feed.cna_name_by_prefix(&package.name, &os.platform))
            .or_else(|| self.feed.cna_name_by_contains(&package.name, &os.platform))
            .unwrap_or_else(|| DEFAULT_CNA.to_string())
    }

    /// Identities to evaluate: the translator's triples, or the observed
    /// attributes when no translation applies.
    fn identities(&self, ctx: &ScanContext) -> Vec<PackageTranslation> {
        let translated = match self.feed.check_and_translate_package(&ctx.package, &ctx.os) {
            Ok(triples) => triples,
            Err(err) => {
                warn!(package = %ctx.package.name, error = %err, "package translation failed");
                Vec::new()
            }
        };

        let mut identities = Vec::new();
        for mut triple in translated {
            if triple.name.is_empty() {
                // Unusable triple; the others still count.
                debug!(package = %ctx.package.name, "skipping empty translation triple");
                continue;
            }
            if triple.version.is_empty() {
                triple.version = ctx.package.version.clone();
            }
            identities.push(triple);
        }

        if identities.is_empty() {
            identities.push(PackageTranslation {
                name: ctx.package.name.clone(),
                vendor: ctx.package.vendor.clone(),
                version: ctx.package.version.clone(),
            });
        }
        identities
    }
}

impl Stage for PackageScan {
    fn name(&self) -> &'static str {
        "PackageScan"
    }

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError> {
        let cna_name = self.mappings.apply(&self.resolve_cna(&ctx.package, &ctx.os), &ctx.os);
        debug!(package = %ctx.package.name, cna = %cna_name, "scanning package");

        let code_name = ctx.os.code_name.clone();
        let mut matches = Vec::new();
        let mut clean: BTreeSet<String> = BTreeSet::new();

        for identity in self.identities(ctx) {
            let visit = self.feed.visit_candidates(&cna_name, &identity.name, &mut |candidate| {
                if clean.contains(&candidate.cve_id) {
                    return false;
                }
                match evaluate_candidate(candidate, &identity.version, &code_name, &identity.vendor)
                {
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
                // Feed failures stay inside this stage; the event is
                // skipped, not failed.
                warn!(package = %ctx.package.name, error = %err, "feed access failed, skipping event");
                return Ok(Flow::Halt);
            }
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

        if ctx.elements.is_empty() {
            debug!(package = %ctx.package.name, "no vulnerabilities matched");
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }
}

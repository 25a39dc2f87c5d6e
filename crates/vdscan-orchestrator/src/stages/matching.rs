//! Candidate evaluation shared by the package and OS scanners.

use crate::context::MatchCondition;
use std::cmp::Ordering;
use vdscan_core::strings::is_blank;
use vdscan_core::version::{compare_versions, VersionScheme};
use vdscan_feed::candidate::{Status, VersionRule, VulnerabilityCandidate};

/// Outcome of evaluating one candidate against one observed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// The observed version is affected.
    Match(MatchCondition),
    /// An `unaffected` rule matched: the CVE is explicitly clean and no
    /// further rule of it may be recorded.
    Clean,
    NoMatch,
}

fn rule_contains(rule: &VersionRule, observed: &str) -> bool {
    let scheme = VersionScheme::from_tag(&rule.version_type);
    let cmp = |a: &str, b: &str| compare_versions(scheme, a, b);

    // `version: "0"` (or an absent base) leaves the range open below.
    let lower_ok =
        rule.version == "0" || rule.version.is_empty() || cmp(observed, &rule.version) != Ordering::Less;

    if let Some(upper) = &rule.less_than {
        lower_ok && cmp(observed, upper) == Ordering::Less
    } else if let Some(upper) = &rule.less_than_or_equal {
        lower_ok && cmp(observed, upper) != Ordering::Greater
    } else {
        cmp(observed, &rule.version) == Ordering::Equal
    }
}

fn condition_for(rule: &VersionRule) -> MatchCondition {
    if let Some(upper) = &rule.less_than {
        MatchCondition::LessThan(upper.clone())
    } else if let Some(upper) = &rule.less_than_or_equal {
        MatchCondition::LessThanOrEqual(upper.clone())
    } else {
        MatchCondition::Equal(rule.version.clone())
    }
}

/// Evaluate one candidate.
///
/// Gates run first (platform, then vendor), then the version rules in feed
/// order; the first rule containing the observed version decides. A
/// candidate whose rules are all silent falls back to its default status.
pub fn evaluate_candidate(
    candidate: &VulnerabilityCandidate,
    observed_version: &str,
    os_code_name: &str,
    vendor: &str,
) -> CandidateOutcome {
    if !candidate.applies_to_platform(os_code_name) {
        return CandidateOutcome::NoMatch;
    }

    if let Some(candidate_vendor) = &candidate.vendor {
        // An unknown vendor can never satisfy a vendor-scoped advisory.
        if is_blank(vendor) || !candidate_vendor.eq_ignore_ascii_case(vendor) {
            return CandidateOutcome::NoMatch;
        }
    }

    for rule in &candidate.versions {
        if rule_contains(rule, observed_version) {
            return match rule.status {
                Status::Affected => CandidateOutcome::Match(condition_for(rule)),
                Status::Unaffected => CandidateOutcome::Clean,
            };
        }
    }

    if candidate.default_status == Status::Affected {
        return CandidateOutcome::Match(MatchCondition::DefaultStatus);
    }
    CandidateOutcome::NoMatch
}

//! Version comparison across the schemes advisory feeds use.
//!
//! Feed version rules carry a `versionType` tag. Semver rules are compared
//! with the `semver` crate; every other scheme (`custom`, `deb`, `rpm`,
//! `pacman`) goes through an epoch-aware segment comparison: numeric
//! segments compare numerically, alphabetic segments lexicographically, a
//! numeric segment sorts above an alphabetic one, and missing trailing
//! segments count as zero. A `~` component sorts before its base version.

use semver::Version;
use std::cmp::Ordering;

/// Ordering scheme selected by a rule's `versionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScheme {
    Custom,
    Semver,
    Deb,
    Rpm,
    Pacman,
}

impl VersionScheme {
    /// Unknown tags fall back to the generic ordering.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "semver" => Self::Semver,
            "deb" | "dpkg" => Self::Deb,
            "rpm" => Self::Rpm,
            "pacman" => Self::Pacman,
            _ => Self::Custom,
        }
    }
}

/// Compare two version strings under the given scheme.
pub fn compare_versions(scheme: VersionScheme, a: &str, b: &str) -> Ordering {
    match scheme {
        VersionScheme::Semver => semver_cmp(a, b),
        _ => evr_cmp(a, b),
    }
}

fn semver_cmp(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        // Feeds tag some non-semver strings as semver; fall back rather
        // than fail the whole candidate.
        _ => evr_cmp(a, b),
    }
}

/// Epoch-aware comparison used by all non-semver schemes.
fn evr_cmp(a: &str, b: &str) -> Ordering {
    let (epoch_a, rest_a) = split_epoch(a);
    let (epoch_b, rest_b) = split_epoch(b);
    match epoch_a.cmp(&epoch_b) {
        Ordering::Equal => {}
        ord => return ord,
    }
    tilde_cmp(rest_a, rest_b)
}

/// `1:2.3` -> epoch 1, remainder `2.3`. Missing epoch is zero.
fn split_epoch(version: &str) -> (u64, &str) {
    if let Some(idx) = version.find(':') {
        let (epoch, rest) = version.split_at(idx);
        if let Ok(num) = epoch.parse::<u64>() {
            return (num, &rest[1..]);
        }
    }
    (0, version)
}

/// A version carrying `~` sorts before its tilde-stripped base.
fn tilde_cmp(a: &str, b: &str) -> Ordering {
    let (base_a, pre_a) = match a.split_once('~') {
        Some((base, pre)) => (base, Some(pre)),
        None => (a, None),
    };
    let (base_b, pre_b) = match b.split_once('~') {
        Some((base, pre)) => (base, Some(pre)),
        None => (b, None),
    };

    match segment_cmp(base_a, base_b) {
        Ordering::Equal => match (pre_a, pre_b) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(pa), Some(pb)) => segment_cmp(pa, pb),
        },
        ord => ord,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Num(&'a str),
    Alpha(&'a str),
}

fn tokenize(version: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for part in version.split(['.', '-', '_', '+']) {
        let mut rest = part;
        while !rest.is_empty() {
            let numeric = rest.as_bytes()[0].is_ascii_digit();
            let split = rest
                .find(|c: char| c.is_ascii_digit() != numeric)
                .unwrap_or(rest.len());
            let (token, remainder) = rest.split_at(split);
            tokens.push(if numeric {
                Token::Num(token)
            } else {
                Token::Alpha(token)
            });
            rest = remainder;
        }
    }
    tokens
}

/// Compare digit strings numerically without overflow concerns.
fn num_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    let len = tokens_a.len().max(tokens_b.len());

    for idx in 0..len {
        let ord = match (tokens_a.get(idx), tokens_b.get(idx)) {
            (Some(Token::Num(na)), Some(Token::Num(nb))) => num_cmp(na, nb),
            (Some(Token::Alpha(aa)), Some(Token::Alpha(ab))) => aa.cmp(ab),
            // Numeric segments rank above alphabetic ones.
            (Some(Token::Num(_)), Some(Token::Alpha(_))) => Ordering::Greater,
            (Some(Token::Alpha(_)), Some(Token::Num(_))) => Ordering::Less,
            // Missing trailing segments count as zero.
            (Some(Token::Num(na)), None) => num_cmp(na, "0"),
            (None, Some(Token::Num(nb))) => num_cmp("0", nb),
            (Some(Token::Alpha(_)), None) => Ordering::Less,
            (None, Some(Token::Alpha(_))) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

//! Ignore patterns for the file scanner and the watcher
//!
//! Three pattern shapes, classified once when the pattern is parsed:
//! - `*suffix`: the normalized path ends with `suffix` (`*.log`)
//! - `prefix*`: the normalized path starts with `prefix` (`tmp*`)
//! - anything else is a segment pattern, which matches when the path is
//!   the pattern, starts with `pattern/`, contains `/pattern` anywhere, or
//!   has a segment after the first one that ends with `pattern`
//!
//! Segment matching is deliberately broad: `build` also suppresses
//! `src/buildtools/x` and `src/rebuild/x.txt`. The ends-with rule reaches
//! any segment but the first, so with the default list `src/app.env` is
//! ignored through `.env`, `lib/foo.git` through `.git` and `pkg/redist/x`
//! through `dist`, while a top-level `rebuild/x` is still tracked.

use crate::store::UNDU_DIR;
use serde::{Deserialize, Serialize};

/// One parsed ignore pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnorePattern {
    Suffix(String),
    Prefix(String),
    Segment(String),
}

impl IgnorePattern {
    pub fn parse(pattern: &str) -> Self {
        if let Some(suffix) = pattern.strip_prefix('*') {
            IgnorePattern::Suffix(suffix.to_string())
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            IgnorePattern::Prefix(prefix.to_string())
        } else {
            IgnorePattern::Segment(pattern.to_string())
        }
    }

    /// Match against a `/`-separated project-relative path
    pub fn matches(&self, path: &str) -> bool {
        match self {
            IgnorePattern::Suffix(suffix) => path.ends_with(suffix.as_str()),
            IgnorePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            IgnorePattern::Segment(segment) => segment_matches(path, segment),
        }
    }
}

fn segment_matches(path: &str, segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if path == segment {
        return true;
    }
    if path.len() > segment.len()
        && path.starts_with(segment)
        && path.as_bytes()[segment.len()] == b'/'
    {
        return true;
    }
    // Covers `/segment/` and `/segment` as a trailing component
    if path.contains(&format!("/{segment}")) {
        return true;
    }
    path.split('/').skip(1).any(|part| part.ends_with(segment))
}

/// Ordered set of ignore patterns; `.undu` is always part of it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct IgnoreSet {
    raw: Vec<String>,
    #[serde(skip)]
    patterns: Vec<IgnorePattern>,
}

impl IgnoreSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut parsed: Vec<IgnorePattern> = raw.iter().map(|p| IgnorePattern::parse(p)).collect();
        let builtin = IgnorePattern::Segment(UNDU_DIR.to_string());
        if !parsed.contains(&builtin) {
            parsed.insert(0, builtin);
        }
        Self { raw, patterns: parsed }
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// The patterns as configured (without the implicit `.undu`)
    pub fn raw(&self) -> &[String] {
        &self.raw
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        IgnoreSet::new(Vec::<String>::new())
    }
}

impl From<Vec<String>> for IgnoreSet {
    fn from(raw: Vec<String>) -> Self {
        IgnoreSet::new(raw)
    }
}

impl From<IgnoreSet> for Vec<String> {
    fn from(set: IgnoreSet) -> Self {
        set.raw
    }
}

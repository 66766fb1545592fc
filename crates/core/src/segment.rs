//! Targeting segments — hierarchical taxonomy tokens such as
//! `"technology & computing-software"`, where the text before the first
//! delimiter is the parent segment.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An ordered list of segments, most relevant first.
pub type SegmentList = Vec<Segment>;

/// A targeting segment. Equality and hashing ignore case; the original
/// spelling is kept for display and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Segment {
    raw: String,
    key: String,
}

impl Segment {
    pub const DELIMITER: char = '-';
    pub const UNTARGETED: &'static str = "untargeted";

    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into().trim().to_string();
        let key = raw.to_lowercase();
        Self { raw, key }
    }

    pub fn untargeted() -> Self {
        Self::new(Self::UNTARGETED)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercase form used for comparisons.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_untargeted(&self) -> bool {
        self.key == Self::UNTARGETED
    }

    pub fn is_hierarchical(&self) -> bool {
        self.parent().is_some()
    }

    pub fn parent(&self) -> Option<Segment> {
        let (parent, child) = self.raw.split_once(Self::DELIMITER)?;
        if parent.trim().is_empty() || child.trim().is_empty() {
            return None;
        }
        Some(Segment::new(parent))
    }

    /// The parent segment, or the segment itself when it has no parent.
    pub fn parent_or_self(&self) -> Segment {
        self.parent().unwrap_or_else(|| self.clone())
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for Segment {
    fn from(raw: String) -> Self {
        Segment::new(raw)
    }
}

impl From<&str> for Segment {
    fn from(raw: &str) -> Self {
        Segment::new(raw)
    }
}

impl From<Segment> for String {
    fn from(segment: Segment) -> Self {
        segment.raw
    }
}

pub fn parent_of(segment: &Segment) -> Option<Segment> {
    segment.parent()
}

/// Parent projection of a list, deduplicated, order of first appearance kept.
pub fn parent_segments(segments: &[Segment]) -> SegmentList {
    let mut parents: SegmentList = Vec::with_capacity(segments.len());
    for segment in segments {
        let parent = segment.parent_or_self();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }
    parents
}

/// True if any candidate segment equals any target segment.
pub fn matches_exact(candidate: &[Segment], target: &[Segment]) -> bool {
    candidate.iter().any(|c| target.iter().any(|t| c == t))
}

/// True if any candidate segment shares a parent with any target segment.
pub fn matches_parent(candidate: &[Segment], target: &[Segment]) -> bool {
    candidate.iter().any(|c| {
        let parent = c.parent_or_self();
        target.iter().any(|t| t.parent_or_self() == parent)
    })
}

/// True iff any candidate segment equals, or shares a parent-prefix with,
/// any target segment. An empty target list matches nothing.
pub fn matches(candidate: &[Segment], target: &[Segment]) -> bool {
    matches_exact(candidate, target) || matches_parent(candidate, target)
}

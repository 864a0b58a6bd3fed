//! Paths: ordered segment sequences naming a location under a traversal root.
//!
//! A path is immutable and persistent: appending returns a new path that
//! shares its prefix with the original by reference, so sibling traversal
//! frames can hold the parent path without aliasing concerns and extension
//! is O(1) per segment.
//!
//! # Citations
//! - Persistent data structures: Okasaki, "Purely Functional Data Structures", Chapter 2 (1999)
//! - Focused navigation: Huet, "Functional Pearl: The Zipper" (1997)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One step in a path: a map key or a list index.
///
/// The segment type is erased to a stringifiable token: equality, hashing,
/// and selector comparisons all go through the common string form, so a
/// field segment `"1"` and an index segment `1` address the same child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PathSegment {
    /// A map key.
    Field(String),
    /// A list index.
    Index(i64),
}

impl PathSegment {
    /// Creates a field segment.
    #[inline]
    pub fn field(key: impl Into<String>) -> Self {
        PathSegment::Field(key.into())
    }

    /// Creates an index segment.
    #[inline]
    pub const fn index(i: i64) -> Self {
        PathSegment::Index(i)
    }

    /// The common string representation of this segment.
    pub fn as_string(&self) -> String {
        match self {
            PathSegment::Field(s) => s.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }

    /// The segment as a list index, if it parses as one.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Field(s) => s.parse().ok(),
        }
    }
}

impl PartialEq for PathSegment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathSegment::Field(a), PathSegment::Field(b)) => a == b,
            (PathSegment::Index(a), PathSegment::Index(b)) => a == b,
            _ => self.as_string() == other.as_string(),
        }
    }
}

impl Eq for PathSegment {}

impl Hash for PathSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_string().hash(state);
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(s) => write!(f, "{}", s),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Field(s.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Field(s)
    }
}

impl From<i64> for PathSegment {
    fn from(i: i64) -> Self {
        PathSegment::Index(i)
    }
}

/// Interior spine link of a persistent path.
#[derive(Debug)]
struct PathLink {
    parent: Option<Arc<PathLink>>,
    segment: PathSegment,
    len: usize,
}

/// An immutable path from the traversal root to a node.
///
/// The empty path names the root itself and renders as the empty string.
#[derive(Debug, Clone, Default)]
pub struct Path {
    spine: Option<Arc<PathLink>>,
}

impl Path {
    /// The empty path (the traversal root).
    #[inline]
    pub fn new() -> Self {
        Self { spine: None }
    }

    /// Builds a path from segments in root-to-leaf order.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        segments
            .into_iter()
            .fold(Path::new(), |p, s| p.append(s.into()))
    }

    /// Returns a new path extending this one by a segment.
    ///
    /// The prefix is shared by reference; this path is unchanged.
    pub fn append(&self, segment: impl Into<PathSegment>) -> Path {
        let len = self.len() + 1;
        Path {
            spine: Some(Arc::new(PathLink {
                parent: self.spine.clone(),
                segment: segment.into(),
                len,
            })),
        }
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.spine.as_ref().map_or(0, |l| l.len)
    }

    /// Whether this is the empty (root) path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spine.is_none()
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.spine.as_ref().map(|l| &l.segment)
    }

    /// Materializes the segments in root-to-leaf order.
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.spine.as_ref();
        while let Some(link) = cursor {
            out.push(link.segment.clone());
            cursor = link.parent.as_ref();
        }
        out.reverse();
        out
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut a = self.spine.as_ref();
        let mut b = other.spine.as_ref();
        while let (Some(la), Some(lb)) = (a, b) {
            if Arc::ptr_eq(la, lb) {
                return true;
            }
            if la.segment != lb.segment {
                return false;
            }
            a = la.parent.as_ref();
            b = lb.parent.as_ref();
        }
        true
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in self.segments() {
            segment.hash(state);
        }
    }
}

impl fmt::Display for Path {
    /// Segments joined by `/`, with embedded `/` escaped as `%2F`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.segments() {
            if !first {
                write!(f, "/")?;
            }
            first = false;
            write!(f, "{}", segment.as_string().replace('/', "%2F"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The empty path renders as the empty string.
    #[test]
    fn empty_path_display() {
        assert_eq!(Path::new().to_string(), "");
        assert!(Path::new().is_empty());
        assert_eq!(Path::new().len(), 0);
    }

    /// Appending shares the prefix and leaves the original untouched.
    #[test]
    fn append_is_persistent() {
        let root = Path::new();
        let a = root.append("a");
        let ab = a.append("b");
        let ac = a.append("c");

        assert_eq!(root.to_string(), "");
        assert_eq!(a.to_string(), "a");
        assert_eq!(ab.to_string(), "a/b");
        assert_eq!(ac.to_string(), "a/c");
        assert_eq!(ab.len(), 2);
        // Siblings share the parent spine.
        assert!(Arc::ptr_eq(
            ab.spine.as_ref().unwrap().parent.as_ref().unwrap(),
            ac.spine.as_ref().unwrap().parent.as_ref().unwrap(),
        ));
    }

    /// Embedded slashes are percent-escaped in the string form.
    #[test]
    fn display_escapes_slashes() {
        let p = Path::new().append("a/b").append(3);
        assert_eq!(p.to_string(), "a%2Fb/3");
    }

    /// Equality is structural, by segment string form.
    #[test]
    fn structural_equality() {
        let a = Path::from_segments(["x", "1"]);
        let b = Path::new().append("x").append(1i64);
        assert_eq!(a, b);
        assert_ne!(a, Path::from_segments(["x", "2"]));
        assert_ne!(a, Path::from_segments(["x"]));
    }

    /// Segment string/index erasure round-trips.
    #[test]
    fn segment_erasure() {
        assert_eq!(PathSegment::field("2").as_index(), Some(2));
        assert_eq!(PathSegment::index(2).as_string(), "2");
        assert_eq!(PathSegment::field("two").as_index(), None);
        assert_eq!(PathSegment::field("2"), PathSegment::index(2));
    }

    /// segments() returns root-to-leaf order.
    #[test]
    fn segments_order() {
        let p = Path::from_segments(["a", "b", "c"]);
        let strs: Vec<String> = p.segments().iter().map(|s| s.as_string()).collect();
        assert_eq!(strs, vec!["a", "b", "c"]);
    }
}

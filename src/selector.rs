//! The selector algebra: recursive descriptions of which subgraph to visit.
//!
//! A selector is an immutable value answering three questions for the
//! traversal engine: which child segments it cares about ([`interests`]),
//! which selector governs a named child ([`explore`]), and whether the
//! current node is a selection match ([`decide`]). Composite variants fold
//! the answers of their members; recursion is expressed structurally with
//! [`Selector::ExploreRecursiveEdge`] markers that are substituted at
//! selection time by carrying the recursive wrapper and a remaining-limit
//! counter, never by mutating the selector tree.
//!
//! [`interests`]: Selector::interests
//! [`explore`]: Selector::explore
//! [`decide`]: Selector::decide
//!
//! # Citations
//! - Declarative path selection: Clark & DeRose, "XML Path Language (XPath) 1.0", W3C (1999)
//! - Regular path queries on graphs: Mendelzon & Wood, "Finding regular simple paths in graph databases" (1995)
//! - One-hole contexts: McBride, "The derivative of a regular type is its type of one-hole contexts" (2001)

use crate::node::{Kind, Node};
use crate::path::PathSegment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Bound on recursion depth for [`Selector::ExploreRecursive`].
///
/// `Depth(n)` permits `n` further edge crossings; `None` is unbounded (the
/// graph itself must then be finite along selected paths).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionLimit {
    /// At most this many further recursion-edge crossings.
    Depth(u64),
    /// No bound.
    None,
}

/// Value-level predicate for [`Selector::ExploreConditional`].
///
/// Conditions are plain data (no closures) so selectors stay comparable,
/// serializable, and shareable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// The node's kind equals the given kind.
    Kind(Kind),
    /// The node equals the given literal.
    Equals(Arc<Node>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates the predicate against a node.
    pub fn evaluate(&self, node: &Node) -> bool {
        match self {
            Condition::Kind(kind) => node.kind() == *kind,
            Condition::Equals(expected) => node == &**expected,
            Condition::Not(inner) => !inner.evaluate(node),
        }
    }
}

/// Error type for selector construction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// A range selector with `start > end`.
    InvalidRange {
        /// Inclusive start of the requested range.
        start: i64,
        /// Exclusive end of the requested range.
        end: i64,
    },
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::InvalidRange { start, end } => {
                write!(f, "invalid range: start {} exceeds end {}", start, end)
            }
        }
    }
}

impl std::error::Error for SelectorError {}

/// A declarative, composable description of which nodes to visit.
///
/// Selectors are immutable; composite variants hold their members behind
/// `Arc` so exploration can hand out sub-selectors by sharing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    /// Selects the current node; explores nothing.
    Matcher,
    /// Applies `next` to every child.
    ExploreAll {
        /// Selector for each child.
        next: Arc<Selector>,
    },
    /// Applies a per-field selector to the named map fields.
    ///
    /// Fields are kept in insertion order and compared against segments by
    /// their common string form, so `"3"` also addresses list index 3.
    ExploreFields {
        /// Field name to sub-selector, in declaration order.
        fields: Vec<(String, Arc<Selector>)>,
    },
    /// Applies `next` to the single list index.
    ExploreIndex {
        /// The index of interest.
        index: i64,
        /// Selector for that child.
        next: Arc<Selector>,
    },
    /// Applies `next` to every index in `[start, end)`.
    ///
    /// Dense ranges may be large, so this variant declares no finite
    /// interest list and filters during full iteration instead.
    ExploreRange {
        /// Inclusive start index.
        start: i64,
        /// Exclusive end index.
        end: i64,
        /// Selector for each child in range.
        next: Arc<Selector>,
    },
    /// Recursion wrapper: re-applies `sequence` wherever it reaches an
    /// [`Selector::ExploreRecursiveEdge`] marker, up to `limit` crossings.
    ///
    /// `current` is the in-flight position within the sequence; it equals
    /// `sequence` at construction and is advanced by `explore`.
    ExploreRecursive {
        /// Remaining crossings allowed.
        limit: RecursionLimit,
        /// The sequence restarted at each edge.
        sequence: Arc<Selector>,
        /// Progress within the current sequence instance.
        current: Arc<Selector>,
    },
    /// Marker substituted by the nearest enclosing `ExploreRecursive`.
    ///
    /// Has no meaning of its own; the engine reports a selector misuse if
    /// it reaches one outside a recursion wrapper.
    ExploreRecursiveEdge,
    /// Union: matches if any member matches, explores the union of member
    /// explorations.
    ExploreUnion(Vec<Arc<Selector>>),
    /// Applies `next` only where `condition` holds on the current node.
    ExploreConditional {
        /// Gate evaluated against the node being explored.
        condition: Condition,
        /// Selector applied when the gate holds.
        next: Arc<Selector>,
    },
}

impl Selector {
    /// A selector matching exactly the current node.
    #[inline]
    pub const fn matcher() -> Selector {
        Selector::Matcher
    }

    /// Explores every child with `next`.
    pub fn explore_all(next: Selector) -> Selector {
        Selector::ExploreAll { next: Arc::new(next) }
    }

    /// Explores the named fields, each with its own selector.
    pub fn explore_fields<K, I>(fields: I) -> Selector
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Selector)>,
    {
        Selector::ExploreFields {
            fields: fields
                .into_iter()
                .map(|(k, s)| (k.into(), Arc::new(s)))
                .collect(),
        }
    }

    /// Explores one list index with `next`.
    pub fn explore_index(index: i64, next: Selector) -> Selector {
        Selector::ExploreIndex { index, next: Arc::new(next) }
    }

    /// Explores indexes in `[start, end)` with `next`.
    pub fn explore_range(start: i64, end: i64, next: Selector) -> Result<Selector, SelectorError> {
        if start > end {
            return Err(SelectorError::InvalidRange { start, end });
        }
        Ok(Selector::ExploreRange { start, end, next: Arc::new(next) })
    }

    /// Wraps `sequence` in a recursion with the given limit.
    pub fn explore_recursive(limit: RecursionLimit, sequence: Selector) -> Selector {
        let sequence = Arc::new(sequence);
        Selector::ExploreRecursive { limit, current: sequence.clone(), sequence }
    }

    /// The recursion-edge marker.
    #[inline]
    pub const fn explore_recursive_edge() -> Selector {
        Selector::ExploreRecursiveEdge
    }

    /// Union of selectors.
    pub fn explore_union<I>(members: I) -> Selector
    where
        I: IntoIterator<Item = Selector>,
    {
        Selector::ExploreUnion(members.into_iter().map(Arc::new).collect())
    }

    /// Conditional exploration.
    pub fn explore_conditional(condition: Condition, next: Selector) -> Selector {
        Selector::ExploreConditional { condition, next: Arc::new(next) }
    }

    /// The finite set of segments this selector cares about, if it has one.
    ///
    /// `None` means "high cardinality": the engine should iterate every
    /// child and ask [`Selector::explore`] for each.
    pub fn interests(&self) -> Option<Vec<PathSegment>> {
        match self {
            Selector::Matcher | Selector::ExploreRecursiveEdge => Some(Vec::new()),
            Selector::ExploreAll { .. } | Selector::ExploreRange { .. } => None,
            Selector::ExploreFields { fields } => Some(
                fields
                    .iter()
                    .map(|(k, _)| PathSegment::field(k.clone()))
                    .collect(),
            ),
            Selector::ExploreIndex { index, .. } => Some(vec![PathSegment::index(*index)]),
            Selector::ExploreRecursive { current, .. } => current.interests(),
            Selector::ExploreUnion(members) => {
                let mut all = Vec::new();
                for member in members {
                    let mut some = member.interests()?;
                    for segment in some.drain(..) {
                        if !all.contains(&segment) {
                            all.push(segment);
                        }
                    }
                }
                Some(all)
            }
            Selector::ExploreConditional { next, .. } => next.interests(),
        }
    }

    /// Returns the selector to apply to the named child, or `None` if this
    /// selector is uninterested in that segment.
    ///
    /// `node` is the parent whose child is being considered.
    pub fn explore(&self, node: &Node, segment: &PathSegment) -> Option<Arc<Selector>> {
        match self {
            Selector::Matcher | Selector::ExploreRecursiveEdge => None,
            Selector::ExploreAll { next } => Some(next.clone()),
            Selector::ExploreFields { fields } => {
                let wanted = segment.as_string();
                fields.iter().find(|(k, _)| *k == wanted).map(|(_, s)| s.clone())
            }
            Selector::ExploreIndex { index, next } => {
                (segment.as_index() == Some(*index)).then(|| next.clone())
            }
            Selector::ExploreRange { start, end, next } => segment
                .as_index()
                .filter(|i| *start <= *i && *i < *end)
                .map(|_| next.clone()),
            Selector::ExploreRecursive { limit, sequence, current } => {
                let next = current.explore(node, segment)?;
                Self::substitute_edges(*limit, sequence, next)
            }
            Selector::ExploreUnion(members) => {
                let selected: Vec<Arc<Selector>> = members
                    .iter()
                    .filter_map(|m| m.explore(node, segment))
                    .collect();
                match selected.len() {
                    0 => None,
                    1 => selected.into_iter().next(),
                    _ => Some(Arc::new(Selector::ExploreUnion(selected))),
                }
            }
            Selector::ExploreConditional { condition, next } => {
                if condition.evaluate(node) {
                    next.explore(node, segment)
                } else {
                    None
                }
            }
        }
    }

    /// Whether the current node is a selection match.
    pub fn decide(&self, node: &Node) -> bool {
        match self {
            Selector::Matcher => true,
            Selector::ExploreAll { .. }
            | Selector::ExploreFields { .. }
            | Selector::ExploreIndex { .. }
            | Selector::ExploreRange { .. }
            | Selector::ExploreRecursiveEdge => false,
            Selector::ExploreRecursive { current, .. } => current.decide(node),
            Selector::ExploreUnion(members) => members.iter().any(|m| m.decide(node)),
            Selector::ExploreConditional { condition, next } => {
                condition.evaluate(node) && next.decide(node)
            }
        }
    }

    /// Whether this selector can only match, never descend.
    ///
    /// The engine uses this to decide whether exploring into a link-kinded
    /// child requires resolving the link.
    pub fn is_matcher_only(&self) -> bool {
        match self {
            Selector::Matcher => true,
            Selector::ExploreUnion(members) => members.iter().all(|m| m.is_matcher_only()),
            Selector::ExploreRecursive { current, .. } => current.is_matcher_only(),
            Selector::ExploreConditional { next, .. } => next.is_matcher_only(),
            _ => false,
        }
    }

    /// Applies edge substitution to the result of a recursive explore.
    ///
    /// A bare edge is a limit crossing: the sequence restarts with one less
    /// remaining crossing, or exploration stops when the limit is spent. A
    /// selector still containing reachable edges is re-wrapped so later
    /// explores keep substituting; edge-free results are returned as-is.
    fn substitute_edges(
        limit: RecursionLimit,
        sequence: &Arc<Selector>,
        next: Arc<Selector>,
    ) -> Option<Arc<Selector>> {
        match &*next {
            Selector::ExploreRecursiveEdge => Self::restart(limit, sequence),
            Selector::ExploreUnion(members)
                if members
                    .iter()
                    .any(|m| matches!(&**m, Selector::ExploreRecursiveEdge)) =>
            {
                // An edge surfacing as a direct union member is a crossing
                // for that member only; the rest stay in this instance.
                let mut selected = Vec::new();
                for member in members {
                    match &**member {
                        Selector::ExploreRecursiveEdge => {
                            if let Some(restarted) = Self::restart(limit, sequence) {
                                selected.push(restarted);
                            }
                        }
                        _ if member.has_recursive_edge() => {
                            selected.push(Arc::new(Selector::ExploreRecursive {
                                limit,
                                sequence: sequence.clone(),
                                current: member.clone(),
                            }));
                        }
                        _ => selected.push(member.clone()),
                    }
                }
                match selected.len() {
                    0 => None,
                    1 => selected.into_iter().next(),
                    _ => Some(Arc::new(Selector::ExploreUnion(selected))),
                }
            }
            _ if next.has_recursive_edge() => Some(Arc::new(Selector::ExploreRecursive {
                limit,
                sequence: sequence.clone(),
                current: next,
            })),
            _ => Some(next),
        }
    }

    /// Restarts the sequence across an edge, spending one crossing.
    fn restart(limit: RecursionLimit, sequence: &Arc<Selector>) -> Option<Arc<Selector>> {
        let limit = match limit {
            RecursionLimit::Depth(0) => return None,
            RecursionLimit::Depth(n) => RecursionLimit::Depth(n - 1),
            RecursionLimit::None => RecursionLimit::None,
        };
        Some(Arc::new(Selector::ExploreRecursive {
            limit,
            sequence: sequence.clone(),
            current: sequence.clone(),
        }))
    }

    /// Whether an edge marker is reachable without crossing into a nested
    /// recursion wrapper (whose edges are its own).
    fn has_recursive_edge(&self) -> bool {
        match self {
            Selector::ExploreRecursiveEdge => true,
            Selector::Matcher | Selector::ExploreRecursive { .. } => false,
            Selector::ExploreAll { next }
            | Selector::ExploreIndex { next, .. }
            | Selector::ExploreRange { next, .. }
            | Selector::ExploreConditional { next, .. } => next.has_recursive_edge(),
            Selector::ExploreFields { fields } => {
                fields.iter().any(|(_, s)| s.has_recursive_edge())
            }
            Selector::ExploreUnion(members) => members.iter().any(|m| m.has_recursive_edge()),
        }
    }
}

//! The node model: a polymorphic value in the data graph.
//!
//! A node is one of nine kinds. `Map` and `List` are recursive kinds whose
//! children are further nodes; the rest are scalars. Nodes are immutable once
//! built, and recursive nodes hold their children behind `Arc` so that
//! traversals can share unchanged subtrees structurally.
//!
//! # Citations
//! - Tagged-union value models: Pierce, "Types and Programming Languages", Chapter 11 (2002)
//! - Merkle DAG data models: Merkle, "A Digital Signature Based on a Conventional Encryption Function" (1987)

use crate::link::Link;
use crate::path::PathSegment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The kind tag of a node.
///
/// Exactly one of nine. `Map` and `List` are the recursive kinds; the rest
/// are scalar. Absence is represented by `Null`; the *undefined* meta-state
/// is reported by [`Node::is_undefined`] and is not a kind of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
    Map,
    List,
}

impl Kind {
    /// Whether this kind has children (maps and lists).
    #[inline]
    pub const fn is_recursive(&self) -> bool {
        matches!(self, Kind::Map | Kind::List)
    }

    /// Whether this kind is a scalar (everything except maps and lists).
    #[inline]
    pub const fn is_scalar(&self) -> bool {
        !self.is_recursive()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Link => "link",
            Kind::Map => "map",
            Kind::List => "list",
        };
        write!(f, "{}", name)
    }
}

/// Error type for node inspection failures.
///
/// Extractors and lookups are total functions returning errors as values;
/// they never panic and have no side effects on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeError {
    /// A kind-specific operation was invoked on a non-matching kind.
    WrongKind {
        /// Name of the operation that was attempted.
        method: &'static str,
        /// Actual kind of the node.
        kind: Kind,
    },
    /// A map key or list index was not present in the node.
    NotFound {
        /// Common string form of the missing segment.
        segment: String,
    },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::WrongKind { method, kind } => {
                write!(f, "cannot call {} on a {} node", method, kind)
            }
            NodeError::NotFound { segment } => write!(f, "no such segment: {:?}", segment),
        }
    }
}

impl std::error::Error for NodeError {}

/// An ordered map node.
///
/// The intrinsic key order is insertion order, stable across traversals of
/// the same node. Inserting an existing key replaces the value in place and
/// keeps the original position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapNode {
    entries: Vec<(String, Arc<Node>)>,
}

impl MapNode {
    /// Creates an empty map node.
    #[inline]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts a key/value pair, replacing in place if the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Arc<Node>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up a value by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Arc<Node>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in intrinsic (insertion) order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &(String, Arc<Node>)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Arc<Node>)> for MapNode {
    fn from_iter<T: IntoIterator<Item = (String, Arc<Node>)>>(iter: T) -> Self {
        let mut map = MapNode::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A node in the data graph.
///
/// Modeled as a tagged variant over the nine kinds rather than dynamically
/// dispatched trait objects: inspection is a match, kind queries are O(1),
/// and the whole capability surface lives in one place.
///
/// `Undefined` is the meta-state for "no value was ever assigned here". It
/// reports `Kind::Null` from [`Node::kind`] (the nine-tag contract) but is
/// distinguished by [`Node::is_undefined`]. Traversal never produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Node {
    #[default]
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Link(Link),
    Map(MapNode),
    List(Vec<Arc<Node>>),
}

impl Node {
    /// Returns the kind tag of this node.
    #[inline]
    pub const fn kind(&self) -> Kind {
        match self {
            Node::Null | Node::Undefined => Kind::Null,
            Node::Bool(_) => Kind::Bool,
            Node::Int(_) => Kind::Int,
            Node::Float(_) => Kind::Float,
            Node::String(_) => Kind::String,
            Node::Bytes(_) => Kind::Bytes,
            Node::Link(_) => Kind::Link,
            Node::Map(_) => Kind::Map,
            Node::List(_) => Kind::List,
        }
    }

    /// Whether this node is the null value.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Whether this node is the undefined meta-state.
    #[inline]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Node::Undefined)
    }

    /// Extracts the boolean value.
    pub fn as_bool(&self) -> Result<bool, NodeError> {
        match self {
            Node::Bool(b) => Ok(*b),
            other => Err(NodeError::WrongKind { method: "as_bool", kind: other.kind() }),
        }
    }

    /// Extracts the integer value.
    pub fn as_int(&self) -> Result<i64, NodeError> {
        match self {
            Node::Int(i) => Ok(*i),
            other => Err(NodeError::WrongKind { method: "as_int", kind: other.kind() }),
        }
    }

    /// Extracts the float value.
    pub fn as_float(&self) -> Result<f64, NodeError> {
        match self {
            Node::Float(x) => Ok(*x),
            other => Err(NodeError::WrongKind { method: "as_float", kind: other.kind() }),
        }
    }

    /// Extracts the string value.
    pub fn as_str(&self) -> Result<&str, NodeError> {
        match self {
            Node::String(s) => Ok(s),
            other => Err(NodeError::WrongKind { method: "as_str", kind: other.kind() }),
        }
    }

    /// Extracts the byte string.
    pub fn as_bytes(&self) -> Result<&[u8], NodeError> {
        match self {
            Node::Bytes(b) => Ok(b),
            other => Err(NodeError::WrongKind { method: "as_bytes", kind: other.kind() }),
        }
    }

    /// Extracts the link value.
    pub fn as_link(&self) -> Result<&Link, NodeError> {
        match self {
            Node::Link(l) => Ok(l),
            other => Err(NodeError::WrongKind { method: "as_link", kind: other.kind() }),
        }
    }

    /// Looks up a map entry by string key.
    pub fn lookup_by_string(&self, key: &str) -> Result<Arc<Node>, NodeError> {
        match self {
            Node::Map(map) => map.get(key).cloned().ok_or_else(|| NodeError::NotFound {
                segment: key.to_owned(),
            }),
            other => Err(NodeError::WrongKind { method: "lookup_by_string", kind: other.kind() }),
        }
    }

    /// Looks up a map entry using a node as the key.
    ///
    /// The key node must be a string node; map keys are strings.
    pub fn lookup_by_node(&self, key: &Node) -> Result<Arc<Node>, NodeError> {
        self.lookup_by_string(key.as_str()?)
    }

    /// Looks up a list entry by index.
    pub fn lookup_by_index(&self, index: i64) -> Result<Arc<Node>, NodeError> {
        match self {
            Node::List(items) => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| NodeError::NotFound { segment: index.to_string() }),
            other => Err(NodeError::WrongKind { method: "lookup_by_index", kind: other.kind() }),
        }
    }

    /// Looks up a child by path segment.
    ///
    /// Maps resolve the segment's common string form as a key; lists parse
    /// it as an index.
    pub fn lookup_by_segment(&self, segment: &PathSegment) -> Result<Arc<Node>, NodeError> {
        match self {
            Node::Map(_) => self.lookup_by_string(&segment.as_string()),
            Node::List(_) => {
                let index = segment.as_index().ok_or_else(|| NodeError::NotFound {
                    segment: segment.as_string(),
                })?;
                self.lookup_by_index(index)
            }
            other => Err(NodeError::WrongKind { method: "lookup_by_segment", kind: other.kind() }),
        }
    }

    /// Returns an iterator over map entries.
    ///
    /// The iterator is finite, single-pass, and yields entries in the map's
    /// intrinsic key order. Steps are fallible so that lazily decoded
    /// representations can surface per-step errors.
    pub fn map_iterator(&self) -> Result<MapIterator<'_>, NodeError> {
        match self {
            Node::Map(map) => Ok(MapIterator { inner: map.entries.iter() }),
            other => Err(NodeError::WrongKind { method: "map_iterator", kind: other.kind() }),
        }
    }

    /// Returns an iterator over list entries, yielding `(index, value)`.
    pub fn list_iterator(&self) -> Result<ListIterator<'_>, NodeError> {
        match self {
            Node::List(items) => Ok(ListIterator { inner: items.iter().enumerate() }),
            other => Err(NodeError::WrongKind { method: "list_iterator", kind: other.kind() }),
        }
    }

    /// Number of children for recursive kinds; `-1` for scalars.
    pub fn length(&self) -> i64 {
        match self {
            Node::Map(map) => map.len() as i64,
            Node::List(items) => items.len() as i64,
            _ => -1,
        }
    }

    /// Builds a map node from key/value pairs.
    pub fn map<K, I>(entries: I) -> Node
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Arc::new(v)))
                .collect(),
        )
    }

    /// Builds a list node from values.
    pub fn list<I>(items: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        Node::List(items.into_iter().map(Arc::new).collect())
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Int(i)
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Node::Float(x)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.to_owned())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s)
    }
}

impl From<Vec<u8>> for Node {
    fn from(b: Vec<u8>) -> Self {
        Node::Bytes(b)
    }
}

impl From<Link> for Node {
    fn from(l: Link) -> Self {
        Node::Link(l)
    }
}

/// Single-pass iterator over map entries.
///
/// Yields `(key_node, value_node)` pairs in intrinsic order.
pub struct MapIterator<'a> {
    inner: std::slice::Iter<'a, (String, Arc<Node>)>,
}

impl Iterator for MapIterator<'_> {
    type Item = Result<(Arc<Node>, Arc<Node>), NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, v)| Ok((Arc::new(Node::String(k.clone())), v.clone())))
    }
}

/// Single-pass iterator over list entries.
///
/// Yields `(index, value_node)` pairs in order.
pub struct ListIterator<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, Arc<Node>>>,
}

impl Iterator for ListIterator<'_> {
    type Item = Result<(i64, Arc<Node>), NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(i, v)| Ok((i as i64, v.clone())))
    }
}

//! Wayfarer: selector-driven traversal over content-addressed, typed data graphs.
//!
//! A graph here is a tree of heterogeneous nodes whose leaves may be *links*:
//! opaque content addresses that, when dereferenced through a pluggable
//! loader, yield further graph fragments. A *selector* is a declarative,
//! composable description of which subset of the graph to visit. The engine
//! walks the graph under the selector's guidance, resolves links lazily along
//! selected paths, and invokes a caller-supplied visitor at each point of
//! interest: read-only, with reasons, or transforming.
//!
//! # Name Origin: "Wayfarer"
//!
//! A wayfarer travels by way of paths rather than destinations. The engine
//! works the same way: it owns no data and no storage, it only knows how to
//! follow paths through somebody else's graph, asking the selector at every
//! step whether this is a place worth stopping.
//!
//! # References
//!
//! - Merkle, "A Digital Signature Based on a Conventional Encryption Function" (1987) – hash-linked data
//! - Clark & DeRose, "XML Path Language (XPath) 1.0", W3C (1999) – declarative path selection
//! - Huet, "Functional Pearl: The Zipper" (1997) – focused traversal state
//! - Okasaki, "Purely Functional Data Structures" (1999) – persistent paths and structural sharing
//!
//! # Example
//!
//! ```
//! use wayfarer::prelude::*;
//! use std::sync::Arc;
//!
//! let root = Arc::new(Node::map([("a", Node::Int(1)), ("b", Node::Int(2))]));
//! let selector = Selector::explore_fields([("a", Selector::matcher())]);
//!
//! let mut seen = Vec::new();
//! traverse(&root, &selector, |progress, node| {
//!     seen.push((progress.path.to_string(), node.as_int().unwrap()));
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(seen, vec![("a".to_string(), 1)]);
//! ```

pub mod link;
pub mod node;
pub mod path;
pub mod selector;
pub mod store;
pub mod traversal;

pub use crate::link::{
    CancelToken, Link, LinkContext, LinkError, LinkLoader, NodeBuilder, NodeBuilderChooser,
};
pub use crate::node::{Kind, MapNode, Node, NodeError};
pub use crate::path::{Path, PathSegment};
pub use crate::selector::{Condition, RecursionLimit, Selector, SelectorError};
pub use crate::store::{CborBuilderChooser, CborNodeBuilder, MemoryStore};
pub use crate::traversal::{
    traverse, traverse_informatively, traverse_transform, AdvVisitFn, Config,
    LinkTargetNodePolicy, TransformFn, TraversalError, TraversalProgress, TraversalReason,
    VisitFn,
};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::link::{
        CancelToken, Link, LinkContext, LinkError, LinkLoader, NodeBuilder, NodeBuilderChooser,
    };
    pub use crate::node::{Kind, MapNode, Node, NodeError};
    pub use crate::path::{Path, PathSegment};
    pub use crate::selector::{Condition, RecursionLimit, Selector, SelectorError};
    pub use crate::store::{
        decode_node, encode_node, CborBuilderChooser, CborNodeBuilder, MemoryStore,
    };
    pub use crate::traversal::{
        traverse, traverse_informatively, traverse_transform, AdvVisitFn, Config,
        LinkTargetNodePolicy, TransformFn, TraversalError, TraversalProgress, TraversalReason,
        VisitFn,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    /// End-to-end: a document whose chapters live in separate blocks,
    /// walked with one recursive selector. Paths cross link boundaries
    /// transparently and every block is fetched exactly once.
    #[test]
    fn multi_block_walk() {
        let mut store = MemoryStore::new();
        let chapter_one = store.put(&Node::map([("title", Node::from("one"))]));
        let chapter_two = store.put(&Node::map([("title", Node::from("two"))]));
        let root = Arc::new(Node::map([(
            "chapters",
            Node::list([Node::Link(chapter_one), Node::Link(chapter_two)]),
        )]));
        let store = Arc::new(store);

        let progress = TraversalProgress::new(
            Config::new().with_loader(store.clone() as Arc<dyn LinkLoader>),
        );
        let selector = Selector::explore_recursive(
            RecursionLimit::Depth(4),
            Selector::explore_union([
                Selector::matcher(),
                Selector::explore_all(Selector::explore_recursive_edge()),
            ]),
        );

        let mut titles = Vec::new();
        progress
            .traverse(&root, &selector, |progress, node| {
                if let Ok(s) = node.as_str() {
                    titles.push((progress.path.to_string(), s.to_owned()));
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(
            titles,
            vec![
                ("chapters/0/title".to_string(), "one".to_string()),
                ("chapters/1/title".to_string(), "two".to_string()),
            ]
        );
        assert_eq!(store.load_count(), 2);
    }

    /// End-to-end transform: retitle a chapter behind a link, leave the
    /// unselected sibling untouched.
    #[test]
    fn multi_block_transform() {
        let mut store = MemoryStore::new();
        let chapter = store.put(&Node::map([("title", Node::from("draft"))]));
        let root = Arc::new(Node::map([
            ("chapter", Node::Link(chapter)),
            ("frontmatter", Node::map([("author", Node::from("me"))])),
        ]));
        let store = Arc::new(store);

        let progress = TraversalProgress::new(
            Config::new().with_loader(store.clone() as Arc<dyn LinkLoader>),
        );
        let selector = Selector::explore_fields([(
            "chapter",
            Selector::explore_fields([("title", Selector::matcher())]),
        )]);

        let out = progress
            .traverse_transform(&root, &selector, |_progress, _node| {
                Ok(Arc::new(Node::from("final")))
            })
            .unwrap();

        assert_eq!(
            out.lookup_by_string("chapter")
                .unwrap()
                .lookup_by_string("title")
                .unwrap()
                .as_str()
                .unwrap(),
            "final"
        );
        // The unselected sibling is shared with the input by identity.
        assert!(Arc::ptr_eq(
            &out.lookup_by_string("frontmatter").unwrap(),
            &root.lookup_by_string("frontmatter").unwrap(),
        ));
    }
}

//! In-memory content-addressed block store and the canonical node codec.
//!
//! Blocks are the canonical CBOR encoding of a node, keyed by their content
//! address. [`MemoryStore`] is the reference [`LinkLoader`]: enough to build
//! linked graphs in tests, benches, and small programs without an external
//! backend. It counts loads, which is how the engine's laziness is observed.
//!
//! # Citations
//! - CBOR: Bormann & Hoffman, RFC 7049 (2013)
//! - Content-addressable storage: Chacon & Straub, "Pro Git", Section 10.2 "Git Objects" (2014)

use crate::link::{Link, LinkContext, LinkError, LinkLoader, NodeBuilder, NodeBuilderChooser};
use crate::node::Node;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Encodes a node into its canonical block form.
pub fn encode_node(node: &Node) -> Vec<u8> {
    // The node model contains nothing CBOR cannot represent.
    serde_cbor::to_vec(node).expect("Node should serialize to CBOR")
}

/// Decodes a canonical block back into a node.
pub fn decode_node(block: &[u8]) -> Result<Arc<Node>, LinkError> {
    serde_cbor::from_slice(block)
        .map(Arc::new)
        .map_err(|e| LinkError::Decode(e.to_string()))
}

/// The default builder: decodes canonical CBOR blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborNodeBuilder;

impl NodeBuilder for CborNodeBuilder {
    fn build(&self, block: &[u8]) -> Result<Arc<Node>, LinkError> {
        decode_node(block)
    }
}

/// Chooser that hands out [`CborNodeBuilder`] for every link.
#[derive(Debug, Clone)]
pub struct CborBuilderChooser {
    builder: Arc<CborNodeBuilder>,
}

impl Default for CborBuilderChooser {
    fn default() -> Self {
        Self { builder: Arc::new(CborNodeBuilder) }
    }
}

impl NodeBuilderChooser for CborBuilderChooser {
    fn choose(&self, _link: &Link, _ctx: &LinkContext) -> Arc<dyn NodeBuilder> {
        self.builder.clone()
    }
}

/// An in-memory block store keyed by content address.
///
/// Blocks are stored at [`MemoryStore::put`] time; traversals read them
/// back through the [`LinkLoader`] impl. The store is single-threaded by
/// design (the traversal engine is synchronous and depth-first).
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: BTreeMap<Link, Vec<u8>>,
    loads: Cell<u64>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes and stores a node, returning its content address.
    pub fn put(&mut self, node: &Node) -> Link {
        let block = encode_node(node);
        let link = Link::of_bytes(&block);
        self.blocks.insert(link, block);
        link
    }

    /// Returns the raw block for a link, if present.
    pub fn get(&self, link: &Link) -> Option<&[u8]> {
        self.blocks.get(link).map(Vec::as_slice)
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of loads served so far.
    ///
    /// Lets tests assert that links off the selected paths were never
    /// resolved.
    pub fn load_count(&self) -> u64 {
        self.loads.get()
    }
}

impl LinkLoader for MemoryStore {
    fn load_block(&self, link: &Link, _ctx: &LinkContext) -> Result<Vec<u8>, LinkError> {
        self.loads.set(self.loads.get() + 1);
        self.blocks
            .get(link)
            .cloned()
            .ok_or(LinkError::NotFound(*link))
    }
}

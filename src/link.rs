//! Links: opaque content-addressed references between graph fragments.
//!
//! A link names another block of the graph by the SHA-256 digest of that
//! block's canonical encoding. Links are values: two links are equal iff
//! their byte identity is equal, and a link does not own what it points to.
//! Resolution goes through a pluggable [`LinkLoader`] (fetch bytes) and a
//! [`NodeBuilder`] (decode bytes into a node), with the digest re-verified
//! in between.
//!
//! # Citations
//! - Content addressing: Merkle, "A Digital Signature Based on a Conventional Encryption Function" (1987)
//! - Git object store: Chacon & Straub, "Pro Git", Section 10.2 "Git Objects" (2014)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use crate::node::Node;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Domain tag for block content addresses (v1).
const DOMAIN_BLOCK_V1: &[u8] = b"BLOCK";

/// A content address: the 32-byte digest of a block's canonical encoding.
///
/// Equality and ordering are plain byte comparison.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(pub [u8; 32]);

impl Link {
    /// Creates a link from a raw digest.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the content address of a block.
    ///
    /// The digest is domain-separated and length-prefixed:
    /// `SHA-256("WFR:BLOCK:v1" || len_le64(block) || block)`.
    pub fn of_bytes(block: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"WFR:");
        hasher.update(DOMAIN_BLOCK_V1);
        hasher.update(b":v1");
        hasher.update((block.len() as u64).to_le_bytes());
        hasher.update(block);
        Self(hasher.finalize().into())
    }

    /// Resolves this link to a node.
    ///
    /// Fetches the block through `loader`, verifies that its content address
    /// matches this link, then decodes it through `builder`. Checks the
    /// cancellation handle before starting the fetch.
    pub fn load(
        &self,
        cancel: &CancelToken,
        ctx: &LinkContext,
        builder: &dyn NodeBuilder,
        loader: &dyn LinkLoader,
    ) -> Result<Arc<Node>, LinkError> {
        if cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }
        let block = loader.load_block(self, ctx)?;
        let actual = Link::of_bytes(&block);
        if actual != *self {
            return Err(LinkError::HashMismatch { expected: *self, actual });
        }
        builder.build(&block)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Positional metadata for a link resolution.
///
/// Carries where the link was encountered so loaders and builder choosers
/// can make policy decisions that depend on position.
#[derive(Debug, Clone)]
pub struct LinkContext {
    /// Path at which the link-bearing node sits.
    pub link_path: Path,
    /// The link-bearing node itself.
    pub link_node: Arc<Node>,
    /// The node containing the link.
    pub parent_node: Arc<Node>,
}

/// Error type for link resolution failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The loader could not produce the block.
    Loader(String),
    /// The block is not present in the backing store.
    NotFound(Link),
    /// The block's content address does not match the requested link.
    HashMismatch {
        /// The link that was requested.
        expected: Link,
        /// The digest of the bytes actually returned.
        actual: Link,
    },
    /// The block could not be decoded into a node.
    Decode(String),
    /// The operation was cancelled via the config's handle.
    Cancelled,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Loader(msg) => write!(f, "loader failure: {}", msg),
            LinkError::NotFound(link) => write!(f, "block not found: {}", link),
            LinkError::HashMismatch { expected, actual } => {
                write!(f, "content address mismatch: expected {}, got {}", expected, actual)
            }
            LinkError::Decode(msg) => write!(f, "block decode failure: {}", msg),
            LinkError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Fetches raw blocks for links.
///
/// Opaque to the traversal engine. Retry policy belongs to implementations,
/// as does honoring the cancellation handle for slow fetches.
pub trait LinkLoader {
    /// Returns the raw block the link names.
    fn load_block(&self, link: &Link, ctx: &LinkContext) -> Result<Vec<u8>, LinkError>;
}

/// Decodes a raw block into a node.
pub trait NodeBuilder {
    /// Builds a node from the block bytes.
    fn build(&self, block: &[u8]) -> Result<Arc<Node>, LinkError>;
}

/// Chooses a [`NodeBuilder`] for a link about to be resolved.
///
/// The choice may depend on the link and on where it was encountered.
pub trait NodeBuilderChooser {
    /// Returns the builder to decode the given link's block with.
    fn choose(&self, link: &Link, ctx: &LinkContext) -> Arc<dyn NodeBuilder>;
}

/// Cooperative cancellation handle.
///
/// Cloned handles share one flag. The traversal engine never polls this
/// itself; loaders and visitors consult it and surface
/// [`LinkError::Cancelled`] (or a visitor error) when tripped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, untripped token.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been tripped.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

//! The traversal engine: walks a graph under the guidance of a selector.
//!
//! The engine advances (node, selector, path) triples depth-first and
//! synchronously. At each node the selector's `decide` classifies the visit
//! as a match or a mere candidate; for each child the selector's `explore`
//! either yields a sub-selector to recurse with or prunes the branch. A
//! link-kinded child is resolved through the config's loader only when the
//! sub-selector actually needs the target, so unselected links are never
//! fetched.
//!
//! Three entry points share the loop: [`traverse`] (visit matches),
//! [`traverse_informatively`] (visit everything, with reasons), and
//! [`traverse_transform`] (rebuild the graph bottom-up, replacing matches).
//!
//! # Invariants
//! - The path held by a progress value is exactly the lookup route from the
//!   root to the current node, after link resolution along that route.
//! - The current node is never a raw link once the engine has decided to
//!   descend into it.
//! - Errors unwind immediately; nothing is retried and partial transform
//!   output is discarded.
//!
//! # Citations
//! - Depth-first graph walks: Cormen et al., "Introduction to Algorithms", Section 22.3 (2009)
//! - Structural sharing on rebuild: Okasaki, "Purely Functional Data Structures" (1999)

use crate::link::{CancelToken, Link, LinkContext, LinkError, LinkLoader, NodeBuilderChooser};
use crate::node::{Kind, MapNode, Node, NodeError};
use crate::path::{Path, PathSegment};
use crate::selector::Selector;
use crate::store::CborBuilderChooser;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Why a visitor is being called at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalReason {
    /// The selector's `decide` selected this node.
    SelectionMatch,
    /// The engine is passing through this node on the way to matches.
    SelectionCandidate,
}

/// Whether a matcher aimed at a link-kinded node resolves the target first.
///
/// The default leaves the link in place, preserving laziness: the visitor
/// receives the link node itself. `ResolveBeforeDecide` loads the target
/// and runs `decide` (and the visitor) against it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkTargetNodePolicy {
    /// Report the match on the link node as-is (no load).
    #[default]
    LeaveAsLink,
    /// Resolve the link before deciding.
    ResolveBeforeDecide,
}

/// Shared traversal configuration: loader, builder choice, link policy,
/// and the cancellation handle.
///
/// Loader and chooser are invoked from the traversal thread only; the
/// engine mutates no global state.
#[derive(Clone)]
pub struct Config {
    /// Resolves links to raw blocks. `None` makes any required link load an
    /// error, which is fine for link-free graphs.
    pub loader: Option<Arc<dyn LinkLoader>>,
    /// Chooses the decoder for each link about to be resolved.
    pub builder_chooser: Arc<dyn NodeBuilderChooser>,
    /// Matcher-on-link behavior.
    pub link_target_policy: LinkTargetNodePolicy,
    /// Cooperative cancellation handle, consulted by loaders and visitors.
    pub cancel: CancelToken,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loader: None,
            builder_chooser: Arc::new(CborBuilderChooser::default()),
            link_target_policy: LinkTargetNodePolicy::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("loader", &self.loader.as_ref().map(|_| "<dyn LinkLoader>"))
            .field("link_target_policy", &self.link_target_policy)
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl Config {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the link loader.
    pub fn with_loader(mut self, loader: Arc<dyn LinkLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Sets the builder chooser.
    pub fn with_builder_chooser(mut self, chooser: Arc<dyn NodeBuilderChooser>) -> Self {
        self.builder_chooser = chooser;
        self
    }

    /// Sets the matcher-on-link policy.
    pub fn with_link_target_policy(mut self, policy: LinkTargetNodePolicy) -> Self {
        self.link_target_policy = policy;
        self
    }

    /// Sets the cancellation handle.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Error type for traversal failures.
///
/// Errors are never recovered locally: the engine unwinds with the first
/// one, attaching path context at the site where it is known.
#[derive(Debug, Clone, PartialEq)]
pub enum TraversalError {
    /// Returned by a visitor; propagated unchanged.
    Visitor(String),
    /// A node's iterator or lookup failed mid-traversal.
    Iteration {
        /// Path of the node whose iteration failed.
        path: Path,
        /// The underlying node error.
        source: NodeError,
    },
    /// Link resolution failed.
    LinkLoad {
        /// Path at which the link sits.
        path: Path,
        /// The link that could not be loaded.
        link: Link,
        /// The underlying cause.
        source: LinkError,
    },
    /// A selector was used in a way it does not permit.
    Selector {
        /// Path at which the misuse surfaced.
        path: Path,
        /// Description of the misuse.
        message: String,
    },
    /// The traversal was cancelled via the config's handle.
    Cancelled,
}

impl fmt::Display for TraversalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalError::Visitor(msg) => write!(f, "{}", msg),
            TraversalError::Iteration { path, source } => {
                write!(f, "traversing node at {:?}: {}", path.to_string(), source)
            }
            TraversalError::LinkLoad { path, link, source } => write!(
                f,
                "traversing node at {:?}: could not load link {:?}: {}",
                path.to_string(),
                link.to_string(),
                source
            ),
            TraversalError::Selector { path, message } => {
                write!(f, "traversing node at {:?}: {}", path.to_string(), message)
            }
            TraversalError::Cancelled => write!(f, "traversal cancelled"),
        }
    }
}

impl std::error::Error for TraversalError {}

/// Per-frame traversal state: the current path plus the config handle.
///
/// Passed by value into recursion, so sibling frames see an unchanged path
/// and a descendant's path is a fresh extension sharing the prefix.
#[derive(Debug, Clone, Default)]
pub struct TraversalProgress {
    /// Location of the current node relative to the traversal root.
    pub path: Path,
    /// Shared configuration.
    pub config: Arc<Config>,
}

/// Visitor for [`traverse`]: called only on matches.
pub type VisitFn<'a> =
    dyn FnMut(&TraversalProgress, &Arc<Node>) -> Result<(), TraversalError> + 'a;

/// Visitor for [`traverse_informatively`]: called at every considered node
/// with the reason it was considered.
pub type AdvVisitFn<'a> =
    dyn FnMut(&TraversalProgress, &Arc<Node>, TraversalReason) -> Result<(), TraversalError> + 'a;

/// Callback for [`traverse_transform`]: returns the replacement node.
/// Returning the same `Arc` signals "no change".
pub type TransformFn<'a> =
    dyn FnMut(&TraversalProgress, &Arc<Node>) -> Result<Arc<Node>, TraversalError> + 'a;

impl TraversalProgress {
    /// Creates a root progress with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { path: Path::new(), config: Arc::new(config) }
    }

    /// Walks the graph, calling `visit` at every node the selector matches.
    pub fn traverse<F>(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        mut visit: F,
    ) -> Result<(), TraversalError>
    where
        F: FnMut(&TraversalProgress, &Arc<Node>) -> Result<(), TraversalError>,
    {
        let visit: &mut VisitFn<'_> = &mut visit;
        self.walk(node, selector, &mut |progress, node, reason| {
            if reason != TraversalReason::SelectionMatch {
                return Ok(());
            }
            visit(progress, node)
        })
    }

    /// Walks the graph, calling `visit` at every node the engine considers,
    /// with the reason it was considered.
    pub fn traverse_informatively<F>(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        mut visit: F,
    ) -> Result<(), TraversalError>
    where
        F: FnMut(&TraversalProgress, &Arc<Node>, TraversalReason) -> Result<(), TraversalError>,
    {
        self.walk(node, selector, &mut visit)
    }

    /// Walks the graph and returns a new root in which every matched node
    /// is replaced by the result of `xform`.
    ///
    /// The new tree is built bottom-up: `xform` sees a node whose selected
    /// descendants have already been replaced. Returning the same `Arc`
    /// signals "no change"; untouched subtrees are shared with the input by
    /// identity.
    pub fn traverse_transform<F>(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        mut xform: F,
    ) -> Result<Arc<Node>, TraversalError>
    where
        F: FnMut(&TraversalProgress, &Arc<Node>) -> Result<Arc<Node>, TraversalError>,
    {
        self.walk_transform(node, selector, &mut xform)
    }

    /// Extends the path by one segment, sharing the config.
    fn descend(&self, segment: PathSegment) -> TraversalProgress {
        TraversalProgress {
            path: self.path.append(segment),
            config: self.config.clone(),
        }
    }

    /// The read-only core loop.
    fn walk(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        visit: &mut AdvVisitFn<'_>,
    ) -> Result<(), TraversalError> {
        if matches!(selector, Selector::ExploreRecursiveEdge) {
            return Err(self.bare_edge_error());
        }
        let reason = if selector.decide(node) {
            TraversalReason::SelectionMatch
        } else {
            TraversalReason::SelectionCandidate
        };
        trace!(path = %self.path, ?reason, kind = %node.kind(), "visit");
        visit(self, node, reason)?;

        if !node.kind().is_recursive() {
            return Ok(());
        }

        match selector.interests() {
            Some(segments) => {
                for segment in segments {
                    // A segment missing from the node is not an error; the
                    // selector merely cared about something absent here.
                    let child = match node.lookup_by_segment(&segment) {
                        Ok(child) => child,
                        Err(_) => continue,
                    };
                    self.step(node, &child, segment, selector, visit)?;
                }
            }
            None => match node.kind() {
                Kind::Map => {
                    let iter = node.map_iterator().map_err(|e| self.iteration_error(e))?;
                    for entry in iter {
                        let (key, value) = entry.map_err(|e| self.iteration_error(e))?;
                        let key = key.as_str().map_err(|e| self.iteration_error(e))?.to_owned();
                        self.step(node, &value, PathSegment::field(key), selector, visit)?;
                    }
                }
                Kind::List => {
                    let iter = node.list_iterator().map_err(|e| self.iteration_error(e))?;
                    for entry in iter {
                        let (index, value) = entry.map_err(|e| self.iteration_error(e))?;
                        self.step(node, &value, PathSegment::index(index), selector, visit)?;
                    }
                }
                _ => {}
            },
        }
        Ok(())
    }

    /// Handles one child: explore, resolve a link if descent needs it,
    /// recurse.
    fn step(
        &self,
        parent: &Arc<Node>,
        child: &Arc<Node>,
        segment: PathSegment,
        selector: &Selector,
        visit: &mut AdvVisitFn<'_>,
    ) -> Result<(), TraversalError> {
        let sub = match selector.explore(parent, &segment) {
            Some(sub) => sub,
            None => return Ok(()),
        };
        let progress = self.descend(segment);
        if let Node::Link(link) = &**child {
            if progress.wants_link_target(&sub) {
                let target = progress.resolve_link(parent, child, *link)?;
                return progress.walk(&target, &sub, visit);
            }
        }
        progress.walk(child, &sub, visit)
    }

    /// The transforming core loop. Children first, then the node itself.
    fn walk_transform(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        xform: &mut TransformFn<'_>,
    ) -> Result<Arc<Node>, TraversalError> {
        if matches!(selector, Selector::ExploreRecursiveEdge) {
            return Err(self.bare_edge_error());
        }
        let rebuilt = match node.kind() {
            Kind::Map => self.rebuild_map(node, selector, xform)?,
            Kind::List => self.rebuild_list(node, selector, xform)?,
            _ => node.clone(),
        };
        if selector.decide(node) {
            xform(self, &rebuilt)
        } else {
            Ok(rebuilt)
        }
    }

    /// Rebuilds a map node, replacing explored children that changed.
    ///
    /// Returns the original node by identity when nothing changed.
    fn rebuild_map(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        xform: &mut TransformFn<'_>,
    ) -> Result<Arc<Node>, TraversalError> {
        let mut entries = Vec::with_capacity(node.length().max(0) as usize);
        let mut changed = false;
        let iter = node.map_iterator().map_err(|e| self.iteration_error(e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| self.iteration_error(e))?;
            let key = key.as_str().map_err(|e| self.iteration_error(e))?.to_owned();
            let segment = PathSegment::field(key.clone());
            let new_value = self.transform_child(node, &value, segment, selector, xform)?;
            if !Arc::ptr_eq(&new_value, &value) {
                changed = true;
            }
            entries.push((key, new_value));
        }
        if changed {
            Ok(Arc::new(Node::Map(MapNode::from_iter(entries))))
        } else {
            Ok(node.clone())
        }
    }

    /// Rebuilds a list node, replacing explored children that changed.
    fn rebuild_list(
        &self,
        node: &Arc<Node>,
        selector: &Selector,
        xform: &mut TransformFn<'_>,
    ) -> Result<Arc<Node>, TraversalError> {
        let mut items = Vec::with_capacity(node.length().max(0) as usize);
        let mut changed = false;
        let iter = node.list_iterator().map_err(|e| self.iteration_error(e))?;
        for entry in iter {
            let (index, value) = entry.map_err(|e| self.iteration_error(e))?;
            let new_value =
                self.transform_child(node, &value, PathSegment::index(index), selector, xform)?;
            if !Arc::ptr_eq(&new_value, &value) {
                changed = true;
            }
            items.push(new_value);
        }
        if changed {
            Ok(Arc::new(Node::List(items)))
        } else {
            Ok(node.clone())
        }
    }

    /// Transforms one child, resolving a link first when descent needs the
    /// target.
    ///
    /// A replacement produced beyond a link substitutes the loaded-and-
    /// transformed target for the link node; an unchanged target leaves the
    /// original link in place. The engine cannot re-store blocks, so
    /// persisting replaced targets is the caller's concern.
    fn transform_child(
        &self,
        parent: &Arc<Node>,
        child: &Arc<Node>,
        segment: PathSegment,
        selector: &Selector,
        xform: &mut TransformFn<'_>,
    ) -> Result<Arc<Node>, TraversalError> {
        let sub = match selector.explore(parent, &segment) {
            Some(sub) => sub,
            None => return Ok(child.clone()),
        };
        let progress = self.descend(segment);
        if let Node::Link(link) = &**child {
            if progress.wants_link_target(&sub) {
                let target = progress.resolve_link(parent, child, *link)?;
                let new_target = progress.walk_transform(&target, &sub, xform)?;
                return if Arc::ptr_eq(&new_target, &target) {
                    Ok(child.clone())
                } else {
                    Ok(new_target)
                };
            }
        }
        progress.walk_transform(child, &sub, xform)
    }

    /// Whether exploring with `sub` requires the link's target node.
    fn wants_link_target(&self, sub: &Selector) -> bool {
        !sub.is_matcher_only()
            || self.config.link_target_policy == LinkTargetNodePolicy::ResolveBeforeDecide
    }

    /// Resolves a link-kinded child into its target node.
    ///
    /// `self` is already the child's progress; its path is the link path.
    fn resolve_link(
        &self,
        parent: &Arc<Node>,
        link_node: &Arc<Node>,
        link: Link,
    ) -> Result<Arc<Node>, TraversalError> {
        let loader = self.config.loader.as_ref().ok_or_else(|| TraversalError::LinkLoad {
            path: self.path.clone(),
            link,
            source: LinkError::Loader("no link loader configured".to_owned()),
        })?;
        let ctx = LinkContext {
            link_path: self.path.clone(),
            link_node: link_node.clone(),
            parent_node: parent.clone(),
        };
        let builder = self.config.builder_chooser.choose(&link, &ctx);
        debug!(path = %self.path, link = %link, "resolving link");
        link.load(&self.config.cancel, &ctx, &*builder, &**loader)
            .map_err(|source| match source {
                LinkError::Cancelled => TraversalError::Cancelled,
                source => TraversalError::LinkLoad { path: self.path.clone(), link, source },
            })
    }

    fn iteration_error(&self, source: NodeError) -> TraversalError {
        TraversalError::Iteration { path: self.path.clone(), source }
    }

    fn bare_edge_error(&self) -> TraversalError {
        TraversalError::Selector {
            path: self.path.clone(),
            message: "recursion edge used outside a recursion wrapper".to_owned(),
        }
    }
}

/// Walks `node` under `selector`, calling `visit` on matches only.
pub fn traverse<F>(node: &Arc<Node>, selector: &Selector, visit: F) -> Result<(), TraversalError>
where
    F: FnMut(&TraversalProgress, &Arc<Node>) -> Result<(), TraversalError>,
{
    TraversalProgress::default().traverse(node, selector, visit)
}

/// Walks `node` under `selector`, calling `visit` at every considered node
/// with a [`TraversalReason`].
pub fn traverse_informatively<F>(
    node: &Arc<Node>,
    selector: &Selector,
    visit: F,
) -> Result<(), TraversalError>
where
    F: FnMut(&TraversalProgress, &Arc<Node>, TraversalReason) -> Result<(), TraversalError>,
{
    TraversalProgress::default().traverse_informatively(node, selector, visit)
}

/// Walks `node` under `selector` and returns a new root with every matched
/// node replaced by the result of `xform`.
pub fn traverse_transform<F>(
    node: &Arc<Node>,
    selector: &Selector,
    xform: F,
) -> Result<Arc<Node>, TraversalError>
where
    F: FnMut(&TraversalProgress, &Arc<Node>) -> Result<Arc<Node>, TraversalError>,
{
    TraversalProgress::default().traverse_transform(node, selector, xform)
}

//! Static tree shape.
//!
//! All nodes live in one arena owned by [`Topology`]. Links are [`NodeId`]
//! handles into that arena: a node stores its parent handle and the ordered
//! handles of its children, so there are no ownership cycles and no
//! pointers. The shape is fixed once built; nothing here mutates after
//! construction, which is why lookups need no synchronization.

use std::fmt as StdFmt;

use crate::error::BuildError;
use crate::tracing_helpers::debug_log;

/// Largest number of nodes a [`Topology`] can hold.
pub const MAX_NODES: usize = u32::MAX as usize;

// ============================================================================
//  NodeId
// ============================================================================

/// Handle of a node inside one [`Topology`].
///
/// Handles are only handed out by the tree that owns the node. Using a
/// handle with a different tree is a logic error and may panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: Self = Self(0);

    /// Position of this node in construction order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Build a handle from a construction-order position.
    ///
    /// Callers must have checked `index < MAX_NODES`.
    #[inline]
    #[expect(clippy::cast_possible_truncation, reason = "bounded by MAX_NODES")]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl StdFmt::Display for NodeId {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
//  Node
// ============================================================================

/// One vertex: identity plus structural links.
///
/// Lock state is kept apart in [`LockTable`](crate::table::LockTable) so the
/// shape can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct Node {
    name: Box<str>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent handle; `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in construction order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// True if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// ============================================================================
//  Topology
// ============================================================================

/// Immutable arena of [`Node`]s.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Box<[Node]>,
}

impl Topology {
    /// Build a complete m-ary tree.
    ///
    /// Node `i` (for `i >= 1`) is attached to node `(i - 1) / m`; node `0` is
    /// the root. Names are taken in order. Uniqueness is checked by
    /// [`NodeIndex::build`](crate::index::NodeIndex::build), not here.
    ///
    /// # Errors
    ///
    /// [`BuildError::Empty`], [`BuildError::ZeroBranching`] or
    /// [`BuildError::TooManyNodes`].
    pub fn m_ary<S: AsRef<str>>(names: &[S], branching: usize) -> Result<Self, BuildError> {
        if branching == 0 {
            return Err(BuildError::ZeroBranching);
        }
        if names.is_empty() {
            return Err(BuildError::Empty);
        }
        if names.len() > MAX_NODES {
            return Err(BuildError::TooManyNodes {
                count: names.len(),
                max: MAX_NODES,
            });
        }

        let mut nodes: Vec<Node> = names
            .iter()
            .map(|name| Node {
                name: name.as_ref().into(),
                parent: None,
                children: Vec::new(),
            })
            .collect();

        for i in 1..nodes.len() {
            let parent: usize = (i - 1) / branching;
            nodes[i].parent = Some(NodeId::from_index(parent));
            nodes[parent].children.push(NodeId::from_index(i));
        }

        debug_log!(nodes = nodes.len(), branching, "built m-ary topology");

        Ok(Self {
            nodes: nodes.into_boxed_slice(),
        })
    }

    /// Number of nodes. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: construction rejects empty trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// If `id` was not issued by this topology.
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Parent of `id`.
    #[inline]
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of `id`.
    #[inline]
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Name of `id`.
    #[inline]
    #[must_use]
    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    /// All handles in construction order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    /// Strict ancestors of `id`, nearest first, ending at the root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            topology: self,
            next: self.parent(id),
        }
    }

    /// Number of edges between `id` and the root.
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// True if `ancestor` lies strictly above `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Strict descendants of `id` in depth-first pre-order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants {
            topology: self,
            stack,
        }
    }
}

/// Iterator over strict ancestors. See [`Topology::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    topology: &'a Topology,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current: NodeId = self.next?;
        self.next = self.topology.parent(current);
        Some(current)
    }
}

/// Iterator over strict descendants. See [`Topology::descendants`].
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    topology: &'a Topology,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current: NodeId = self.stack.pop()?;
        self.stack
            .extend(self.topology.children(current).iter().rev().copied());
        Some(current)
    }
}

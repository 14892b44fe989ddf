//! `LockableTree` - hierarchical locks over a fixed-shape tree.
//!
//! The tree combines the immutable [`Topology`] and [`NodeIndex`] with one
//! [`LockTable`] behind a single [`parking_lot::Mutex`]. Every public
//! operation resolves its name without locking, then performs its whole
//! check-and-mutate inside one critical section. Because the read-set of an
//! operation can span the entire root path (lock/unlock) or an entire
//! subtree (upgrade), a per-node scheme would need a global acquisition
//! order; one coarse section gives the same guarantees with none of the
//! deadlock surface.
//!
//! Operations never wait for a *tree* lock to become free: if the
//! precondition does not hold they return `false` immediately. The mutex
//! only serializes the few instructions of each operation.

use parking_lot::Mutex;

use crate::error::{BuildError, InvariantViolation, TreeError};
use crate::index::NodeIndex;
use crate::request::{OpKind, Request};
use crate::stats::{OpCounters, OpStats};
use crate::table::{ActorId, LockState, LockTable};
use crate::topology::{NodeId, Topology};
use crate::tracing_helpers::{debug_log, trace_log, warn_log};

#[cfg(test)]
mod shuttle_tests;


/// A fixed-shape tree whose nodes can be locked by actors.
///
/// `LockableTree` is `Send + Sync`; share it with [`std::sync::Arc`] or
/// scoped threads.
///
/// # Example
///
/// ```rust
/// use lockable_tree::{ActorId, LockableTree};
///
/// let names = ["World", "Asia", "Europe", "China", "India", "Russia", "Italy"];
/// let tree = LockableTree::m_ary(&names, 2).unwrap();
///
/// assert!(tree.lock("China", ActorId(1)).unwrap());
/// assert!(tree.lock("India", ActorId(1)).unwrap());
/// assert!(tree.upgrade("Asia", ActorId(1)).unwrap());
/// assert_eq!(tree.holder("Asia").unwrap(), Some(ActorId(1)));
/// assert_eq!(tree.holder("China").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct LockableTree {
    topology: Topology,
    index: NodeIndex,
    table: Mutex<LockTable>,
    counters: OpCounters,
}

impl LockableTree {
    // ========================================================================
    //  Construction
    // ========================================================================

    /// Build a complete m-ary tree from `names` (root first).
    ///
    /// # Errors
    ///
    /// Any [`BuildError`]: empty input, zero branching, duplicate names.
    pub fn m_ary<S: AsRef<str>>(names: &[S], branching: usize) -> Result<Self, BuildError> {
        let topology: Topology = Topology::m_ary(names, branching)?;
        Self::from_topology(topology)
    }

    /// Wrap an existing topology.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicateName`] if two nodes share a name.
    pub fn from_topology(topology: Topology) -> Result<Self, BuildError> {
        let index: NodeIndex = NodeIndex::build(&topology)?;
        let table: LockTable = LockTable::for_topology(&topology);

        debug_log!(nodes = topology.len(), "lockable tree ready");

        Ok(Self {
            topology,
            index,
            table: Mutex::new(table),
            counters: OpCounters::default(),
        })
    }

    // ========================================================================
    //  Structure
    // ========================================================================

    /// The static shape.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The name index.
    #[must_use]
    pub const fn index(&self) -> &NodeIndex {
        &self.index
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topology.len()
    }

    /// Always false: construction rejects empty trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    /// Resolve `name` to its handle.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`] if the name is not in the tree.
    pub fn resolve(&self, name: &str) -> Result<NodeId, TreeError> {
        self.index.get(name).ok_or_else(|| {
            self.counters.record_unknown();
            warn_log!(node = name, "unknown node name");
            TreeError::UnknownNode {
                name: name.to_owned(),
            }
        })
    }

    // ========================================================================
    //  Operations by name
    // ========================================================================

    /// Lock `name` for `actor`. See [`LockTable::lock`].
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`]; precondition failures are `Ok(false)`.
    pub fn lock(&self, name: &str, actor: ActorId) -> Result<bool, TreeError> {
        self.resolve(name).map(|id| self.lock_id(id, actor))
    }

    /// Unlock `name` if `actor` holds it. See [`LockTable::unlock`].
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`]; precondition failures are `Ok(false)`.
    pub fn unlock(&self, name: &str, actor: ActorId) -> Result<bool, TreeError> {
        self.resolve(name).map(|id| self.unlock_id(id, actor))
    }

    /// Upgrade `name` for `actor`. See [`LockTable::upgrade`].
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`]; precondition failures are `Ok(false)`.
    pub fn upgrade(&self, name: &str, actor: ActorId) -> Result<bool, TreeError> {
        self.resolve(name).map(|id| self.upgrade_id(id, actor))
    }

    /// Dispatch one request.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`]; precondition failures are `Ok(false)`.
    pub fn apply(&self, request: &Request) -> Result<bool, TreeError> {
        self.resolve(&request.node)
            .map(|id| self.apply_id(request.kind, id, request.actor))
    }

    // ========================================================================
    //  Operations by handle
    // ========================================================================

    /// [`lock`](Self::lock) on a resolved handle.
    ///
    /// # Panics
    ///
    /// If `id` did not come from this tree.
    pub fn lock_id(&self, id: NodeId, actor: ActorId) -> bool {
        self.apply_id(OpKind::Lock, id, actor)
    }

    /// [`unlock`](Self::unlock) on a resolved handle.
    ///
    /// # Panics
    ///
    /// If `id` did not come from this tree.
    pub fn unlock_id(&self, id: NodeId, actor: ActorId) -> bool {
        self.apply_id(OpKind::Unlock, id, actor)
    }

    /// [`upgrade`](Self::upgrade) on a resolved handle.
    ///
    /// # Panics
    ///
    /// If `id` did not come from this tree.
    pub fn upgrade_id(&self, id: NodeId, actor: ActorId) -> bool {
        self.apply_id(OpKind::Upgrade, id, actor)
    }

    /// Run `kind` on `id` inside one critical section.
    ///
    /// # Panics
    ///
    /// If `id` did not come from this tree.
    pub fn apply_id(&self, kind: OpKind, id: NodeId, actor: ActorId) -> bool {
        let ok: bool = {
            let mut table = self.table.lock();
            match kind {
                OpKind::Lock => table.lock(&self.topology, id, actor),
                OpKind::Unlock => table.unlock(&self.topology, id, actor),
                OpKind::Upgrade => table.upgrade(&self.topology, id, actor),
            }
        };

        self.counters.record(kind, ok);
        trace_log!(op = %kind, node = self.topology.name(id), %actor, ok, "applied");
        ok
    }

    // ========================================================================
    //  Inspection
    // ========================================================================

    /// Lock fields of `name` at a quiescent point.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`].
    pub fn state(&self, name: &str) -> Result<LockState, TreeError> {
        let id: NodeId = self.resolve(name)?;
        Ok(self.table.lock().state(id))
    }

    /// Actor holding `name`, if locked.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`].
    pub fn holder(&self, name: &str) -> Result<Option<ActorId>, TreeError> {
        self.state(name).map(|s| s.holder())
    }

    /// True if `name` is locked.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`].
    pub fn is_locked(&self, name: &str) -> Result<bool, TreeError> {
        self.state(name).map(|s| s.is_locked())
    }

    /// Number of locked strict descendants of `name`.
    ///
    /// # Errors
    ///
    /// [`TreeError::UnknownNode`].
    pub fn locked_descendants(&self, name: &str) -> Result<u32, TreeError> {
        self.state(name).map(|s| s.locked_descendants())
    }

    /// Every locked node with its holder.
    #[must_use]
    pub fn locked_nodes(&self) -> Vec<(NodeId, ActorId)> {
        self.table.lock().locked_nodes()
    }

    /// Number of locked nodes.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.table.lock().locked_count()
    }

    /// Copy of the whole lock table, taken atomically.
    #[must_use]
    pub fn snapshot(&self) -> LockTable {
        self.table.lock().clone()
    }

    /// Verify counters and mutual exclusion against the current holders.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.table.lock().check_invariants(&self.topology)
    }

    /// Operation counters since construction or the last reset.
    #[must_use]
    pub fn stats(&self) -> OpStats {
        self.counters.snapshot()
    }

    /// Zero the operation counters.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const WORLD: [&str; 7] = ["World", "Asia", "Europe", "China", "India", "Russia", "Italy"];

    fn world() -> LockableTree {
        LockableTree::m_ary(&WORLD, 2).unwrap()
    }

    #[test]
    fn test_tree_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LockableTree>();
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(
            LockableTree::m_ary(&["a", "b", "a"], 2).unwrap_err(),
            BuildError::DuplicateName {
                name: "a".to_owned(),
                first: 0,
                second: 2,
            }
        );
        assert_eq!(
            LockableTree::m_ary(&WORLD, 0).unwrap_err(),
            BuildError::ZeroBranching
        );
    }

    #[test]
    fn test_unknown_name_is_distinct_error() {
        let tree = world();
        let err = tree.lock("Atlantis", ActorId(1)).unwrap_err();
        assert_eq!(
            err,
            TreeError::UnknownNode {
                name: "Atlantis".to_owned()
            }
        );
        assert!(tree.unlock("Atlantis", ActorId(1)).is_err());
        assert!(tree.upgrade("Atlantis", ActorId(1)).is_err());
        assert!(tree.holder("Atlantis").is_err());
        assert_eq!(tree.stats().unknown_node, 4);
        assert_eq!(tree.stats().total_attempts(), 0);
    }

    #[test]
    fn test_apply_dispatch_and_stats() {
        let tree = world();
        assert!(tree.apply(&Request::new(OpKind::Lock, "China", ActorId(7))).unwrap());
        assert!(!tree.apply(&Request::new(OpKind::Lock, "Asia", ActorId(7))).unwrap());
        assert!(tree.apply(&Request::new(OpKind::Upgrade, "Asia", ActorId(7))).unwrap());
        assert!(tree.apply(&Request::new(OpKind::Unlock, "Asia", ActorId(7))).unwrap());

        let stats = tree.stats();
        assert_eq!(stats.lock_attempts, 2);
        assert_eq!(stats.lock_successes, 1);
        assert_eq!(stats.upgrade_successes, 1);
        assert_eq!(stats.unlock_successes, 1);
        assert_eq!(tree.locked_count(), 0);

        tree.reset_stats();
        assert_eq!(tree.stats(), OpStats::default());
    }

    #[test]
    fn test_snapshot_is_consistent_copy() {
        let tree = world();
        assert!(tree.lock("Russia", ActorId(3)).unwrap());
        let snap = tree.snapshot();
        assert!(tree.unlock("Russia", ActorId(3)).unwrap());
        assert_eq!(snap.locked_count(), 1);
        assert_eq!(tree.locked_count(), 0);
        snap.check_invariants(tree.topology()).unwrap();
    }

    #[test]
    fn test_concurrent_same_node_single_winner() {
        let tree = Arc::new(world());
        let handles: Vec<_> = (0..8u64)
            .map(|a| {
                let tree = Arc::clone(&tree);
                thread::spawn(move || tree.lock("Europe", ActorId(a)).unwrap())
            })
            .collect();

        let winners: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().expect("thread panicked")))
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(tree.locked_count(), 1);
        tree.check_invariants().unwrap();
    }
}

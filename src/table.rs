//! Lock state and the lock/unlock/upgrade algorithm.
//!
//! [`LockTable`] holds one [`LockState`] per node and nothing else. It has
//! no synchronization of its own: every mutating method takes `&mut self`,
//! so whoever owns the table (normally the mutex inside
//! [`LockableTree`](crate::LockableTree)) decides how operations are
//! serialized. A traversal running inside one operation only ever borrows
//! the table it was handed, which makes re-acquiring a node's guard from
//! within the same operation impossible to express.
//!
//! # Bookkeeping
//!
//! Each node carries `locked_descendants`, the number of locked strict
//! descendants. `lock`/`unlock` adjust it along the root path, so the
//! "no locked descendant" predicate is a single field read. The same
//! counter prunes the upgrade scan: a subtree whose root reports zero
//! locked descendants (and is not itself locked) is never entered.

use std::fmt as StdFmt;

use crate::error::InvariantViolation;
use crate::topology::{NodeId, Topology};
use crate::tracing_helpers::{trace_log, warn_log};

// ============================================================================
//  ActorId
// ============================================================================

/// Opaque identifier of whoever requests a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u64);

impl From<u64> for ActorId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl StdFmt::Display for ActorId {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "actor{}", self.0)
    }
}

// ============================================================================
//  LockState
// ============================================================================

/// Mutable lock fields of one node.
///
/// `holder` is `Some` exactly when the node is locked, so an owner can never
/// linger on an unlocked node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    holder: Option<ActorId>,
    locked_descendants: u32,
}

impl LockState {
    /// Actor holding the lock, if locked.
    #[inline]
    #[must_use]
    pub const fn holder(&self) -> Option<ActorId> {
        self.holder
    }

    /// True if some actor holds this node.
    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.holder.is_some()
    }

    /// Number of locked strict descendants.
    #[inline]
    #[must_use]
    pub const fn locked_descendants(&self) -> u32 {
        self.locked_descendants
    }
}

// ============================================================================
//  LockTable
// ============================================================================

/// Per-node lock state for one [`Topology`].
///
/// The table does not own the topology; every operation takes it by
/// reference and must be given the same topology the table was sized for.
#[derive(Debug, Clone)]
pub struct LockTable {
    states: Box<[LockState]>,
    locked: usize,
}

impl LockTable {
    /// All-unlocked table for a tree of `len` nodes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![LockState::default(); len].into_boxed_slice(),
            locked: 0,
        }
    }

    /// Table sized for `topology`.
    #[must_use]
    pub fn for_topology(topology: &Topology) -> Self {
        Self::new(topology.len())
    }

    /// State of `id`.
    ///
    /// # Panics
    ///
    /// If `id` is out of range for this table.
    #[inline]
    #[must_use]
    pub fn state(&self, id: NodeId) -> LockState {
        self.states[id.index()]
    }

    /// Number of locked nodes.
    #[must_use]
    pub const fn locked_count(&self) -> usize {
        self.locked
    }

    /// Every locked node with its holder, in construction order.
    #[must_use]
    pub fn locked_nodes(&self) -> Vec<(NodeId, ActorId)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.holder.map(|a| (NodeId::from_index(i), a)))
            .collect()
    }

    // ========================================================================
    //  Operations
    // ========================================================================

    /// Lock `id` for `actor`.
    ///
    /// Succeeds iff `id` is unlocked, has no locked descendant and has no
    /// locked ancestor. On failure nothing changes.
    pub fn lock(&mut self, topology: &Topology, id: NodeId, actor: ActorId) -> bool {
        let state: LockState = self.state(id);
        if state.is_locked() || state.locked_descendants > 0 {
            trace_log!(node = %id, %actor, "lock refused: node or subtree busy");
            return false;
        }
        if self.has_locked_ancestor(topology, id) {
            trace_log!(node = %id, %actor, "lock refused: ancestor locked");
            return false;
        }

        self.acquire(topology, id, actor);
        trace_log!(node = %id, %actor, "locked");
        true
    }

    /// Release `id` if `actor` holds it. On failure nothing changes.
    pub fn unlock(&mut self, topology: &Topology, id: NodeId, actor: ActorId) -> bool {
        if self.state(id).holder != Some(actor) {
            trace_log!(node = %id, %actor, "unlock refused: not the holder");
            return false;
        }

        self.release(topology, id);
        trace_log!(node = %id, %actor, "unlocked");
        true
    }

    /// Replace `actor`'s descendant locks under `id` by one lock on `id`.
    ///
    /// Requires `id` unlocked, at least one locked descendant, every locked
    /// descendant held by `actor`, and no locked ancestor. The scan runs to
    /// completion (or to the first foreign holder) before anything is
    /// touched, so a refused upgrade leaves every descendant lock in place.
    pub fn upgrade(&mut self, topology: &Topology, id: NodeId, actor: ActorId) -> bool {
        let state: LockState = self.state(id);
        if state.is_locked() || state.locked_descendants == 0 {
            trace_log!(node = %id, %actor, "upgrade refused: locked or nothing to absorb");
            return false;
        }

        let Some(owned) = self.collect_owned_descendants(topology, id, actor) else {
            trace_log!(node = %id, %actor, "upgrade refused: descendant held by another actor");
            return false;
        };

        if owned.is_empty() {
            // A positive count with no reachable locked descendant means the
            // counters are out of sync with the holders.
            warn_log!(
                node = %id,
                recorded = state.locked_descendants,
                "upgrade found no locked descendant despite positive count"
            );
            return false;
        }

        // Unreachable while the invariants hold: a locked ancestor forces
        // this node's count to zero.
        if self.has_locked_ancestor(topology, id) {
            return false;
        }

        for &descendant in &owned {
            self.release(topology, descendant);
        }
        debug_assert_eq!(self.state(id).locked_descendants, 0);

        self.acquire(topology, id, actor);
        trace_log!(node = %id, %actor, absorbed = owned.len(), "upgraded");
        true
    }

    // ========================================================================
    //  Internals
    // ========================================================================

    fn has_locked_ancestor(&self, topology: &Topology, id: NodeId) -> bool {
        topology.ancestors(id).any(|a| self.state(a).is_locked())
    }

    /// Mark `id` held and bump every ancestor's count.
    fn acquire(&mut self, topology: &Topology, id: NodeId, actor: ActorId) {
        debug_assert!(!self.state(id).is_locked());
        self.states[id.index()].holder = Some(actor);
        self.locked += 1;
        for ancestor in topology.ancestors(id) {
            self.states[ancestor.index()].locked_descendants += 1;
        }
    }

    /// Clear `id` and drop every ancestor's count.
    fn release(&mut self, topology: &Topology, id: NodeId) {
        debug_assert!(self.state(id).is_locked());
        self.states[id.index()].holder = None;
        self.locked -= 1;
        for ancestor in topology.ancestors(id) {
            let slot: &mut LockState = &mut self.states[ancestor.index()];
            debug_assert!(slot.locked_descendants > 0, "count underflow at {ancestor}");
            slot.locked_descendants -= 1;
        }
    }

    /// Locked strict descendants of `id`, all of which belong to `actor`.
    ///
    /// Returns `None` as soon as a descendant held by anyone else is seen.
    /// Subtrees with no locked node are skipped using the counters, and a
    /// locked node's own subtree is never entered since it cannot contain
    /// further locks.
    fn collect_owned_descendants(
        &self,
        topology: &Topology,
        id: NodeId,
        actor: ActorId,
    ) -> Option<Vec<NodeId>> {
        let mut owned: Vec<NodeId> = Vec::new();
        let mut stack: Vec<NodeId> = topology.children(id).to_vec();

        while let Some(current) = stack.pop() {
            let state: LockState = self.state(current);
            match state.holder {
                Some(holder) if holder != actor => return None,
                Some(_) => owned.push(current),
                None if state.locked_descendants > 0 => {
                    stack.extend_from_slice(topology.children(current));
                }
                None => {}
            }
        }

        Some(owned)
    }

    // ========================================================================
    //  Verification
    // ========================================================================

    /// Recompute every counter from the holders and compare.
    ///
    /// Also checks that no locked node sits below another locked node.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] found.
    pub fn check_invariants(&self, topology: &Topology) -> Result<(), InvariantViolation> {
        let mut actual: Vec<u32> = vec![0; self.states.len()];

        for id in topology.ids() {
            if !self.state(id).is_locked() {
                continue;
            }
            for ancestor in topology.ancestors(id) {
                if self.state(ancestor).is_locked() {
                    return Err(InvariantViolation::NestedLock { node: id, ancestor });
                }
                actual[ancestor.index()] += 1;
            }
        }

        for id in topology.ids() {
            let recorded: u32 = self.state(id).locked_descendants;
            if recorded != actual[id.index()] {
                return Err(InvariantViolation::CountMismatch {
                    node: id,
                    recorded,
                    actual: actual[id.index()],
                });
            }
        }

        Ok(())
    }
}

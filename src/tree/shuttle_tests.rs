//! Shuttle schedule-exploration tests for the lock table.
//!
//! Shuttle runs the closure many times under randomized thread schedules.
//! The real [`LockTable`] is wrapped in shuttle's own mutex, mirroring how
//! [`LockableTree`](super::LockableTree) wraps it in `parking_lot`, so every
//! interleaving of whole operations gets a chance to show up.
//!
//! Shuttle cannot schedule around `parking_lot`, so these tests drive the
//! table through a local wrapper rather than the tree itself. The wrapper
//! records the order in which operations entered the critical section;
//! [`shuttle_history_replays_on_tree`] replays that order through
//! [`LockableTree::apply_id`](super::LockableTree::apply_id) and requires
//! identical results.
//!
//! Run with: `cargo test --lib tree::shuttle_tests`

use shuttle::sync::{Arc, Mutex};
use shuttle::thread;

use crate::request::OpKind;
use crate::table::{ActorId, LockTable};
use crate::topology::{NodeId, Topology};
use crate::tree::LockableTree;

const ITERATIONS: usize = 1000;

const WORLD: [&str; 7] = ["World", "Asia", "Europe", "China", "India", "Russia", "Italy"];

/// One operation as it ran inside the critical section.
type Step = (OpKind, usize, u64, bool);

struct Shared {
    topology: Topology,
    table: Mutex<LockTable>,
    history: Mutex<Vec<Step>>,
}

impl Shared {
    fn world() -> Arc<Self> {
        let topology = Topology::m_ary(&WORLD, 2).unwrap();
        let table = Mutex::new(LockTable::for_topology(&topology));
        Arc::new(Self {
            topology,
            table,
            history: Mutex::new(Vec::new()),
        })
    }

    fn apply(&self, kind: OpKind, node: usize, actor: u64) -> bool {
        let mut table = self.table.lock().unwrap();
        let id = NodeId::from_index(node);
        let ok = match kind {
            OpKind::Lock => table.lock(&self.topology, id, ActorId(actor)),
            OpKind::Unlock => table.unlock(&self.topology, id, ActorId(actor)),
            OpKind::Upgrade => table.upgrade(&self.topology, id, ActorId(actor)),
        };
        // Still under the table guard, so history order is execution order.
        self.history.lock().unwrap().push((kind, node, actor, ok));
        ok
    }

    fn lock(&self, node: usize, actor: u64) -> bool {
        self.apply(OpKind::Lock, node, actor)
    }

    fn unlock(&self, node: usize, actor: u64) -> bool {
        self.apply(OpKind::Unlock, node, actor)
    }

    fn upgrade(&self, node: usize, actor: u64) -> bool {
        self.apply(OpKind::Upgrade, node, actor)
    }

    fn check(&self) {
        let table = self.table.lock().unwrap();
        table.check_invariants(&self.topology).unwrap();
    }
}

/// Parent and child raced by different actors: at most one can win.
#[test]
fn shuttle_parent_child_exclusion() {
    shuttle::check_random(
        || {
            let shared = Shared::world();

            let s1 = Arc::clone(&shared);
            let parent = thread::spawn(move || s1.lock(1, 1));
            let s2 = Arc::clone(&shared);
            let child = thread::spawn(move || s2.lock(3, 2));

            let parent_ok = parent.join().unwrap();
            let child_ok = child.join().unwrap();

            assert!(parent_ok ^ child_ok, "exactly one of Asia/China must win");
            shared.check();
        },
        ITERATIONS,
    );
}

/// Upgrade racing a foreign lock inside the same subtree never leaves a
/// half-absorbed state.
#[test]
fn shuttle_upgrade_vs_foreign_lock() {
    shuttle::check_random(
        || {
            let shared = Shared::world();
            assert!(shared.lock(3, 1));

            let s1 = Arc::clone(&shared);
            let upgrader = thread::spawn(move || s1.upgrade(1, 1));
            let s2 = Arc::clone(&shared);
            let intruder = thread::spawn(move || s2.lock(4, 2));

            let upgraded = upgrader.join().unwrap();
            let intruded = intruder.join().unwrap();

            assert!(upgraded ^ intruded, "upgrade and foreign lock are exclusive");
            let table = shared.table.lock().unwrap();
            if upgraded {
                assert_eq!(table.locked_nodes(), vec![(NodeId::from_index(1), ActorId(1))]);
            } else {
                assert_eq!(table.locked_nodes().len(), 2);
                assert_eq!(table.state(NodeId::from_index(1)).locked_descendants(), 2);
            }
            table.check_invariants(&shared.topology).unwrap();
        },
        ITERATIONS,
    );
}

/// Disjoint subtrees never interfere.
#[test]
fn shuttle_disjoint_subtrees_both_succeed() {
    shuttle::check_random(
        || {
            let shared = Shared::world();

            let handles: Vec<_> = [(3, 1), (6, 2)]
                .into_iter()
                .map(|(node, actor)| {
                    let s = Arc::clone(&shared);
                    thread::spawn(move || s.lock(node, actor))
                })
                .collect();

            for h in handles {
                assert!(h.join().unwrap());
            }
            assert!(!shared.lock(0, 3));
            shared.check();
        },
        ITERATIONS,
    );
}

/// Mixed churn from three actors; invariants hold once all threads finish.
#[test]
fn shuttle_mixed_churn_keeps_invariants() {
    shuttle::check_random(
        || {
            let shared = Shared::world();

            let handles: Vec<_> = (0..3u64)
                .map(|actor| {
                    let s = Arc::clone(&shared);
                    thread::spawn(move || {
                        let leaf: usize = 3 + actor as usize;
                        for _ in 0..2 {
                            let _ = s.lock(leaf, actor);
                            let _ = s.upgrade(leaf.saturating_sub(3) / 2 + 1, actor);
                            let _ = s.unlock(leaf, actor);
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
            shared.check();
        },
        ITERATIONS,
    );
}

/// Whatever order the schedule produced, feeding the same order through the
/// real tree gives the same answers and the same final holders.
#[test]
fn shuttle_history_replays_on_tree() {
    shuttle::check_random(
        || {
            let shared = Shared::world();

            let handles: Vec<_> = (1..=2u64)
                .map(|actor| {
                    let s = Arc::clone(&shared);
                    thread::spawn(move || {
                        let leaves: [usize; 2] = if actor == 1 { [3, 4] } else { [4, 5] };
                        for leaf in leaves {
                            let _ = s.lock(leaf, actor);
                        }
                        let _ = s.upgrade(1, actor);
                        let _ = s.upgrade(0, actor);
                        let _ = s.unlock(leaves[0], actor);
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            let tree = LockableTree::m_ary(&WORLD, 2).unwrap();
            let history = shared.history.lock().unwrap();
            for &(kind, node, actor, ok) in history.iter() {
                let replayed = tree.apply_id(kind, NodeId::from_index(node), ActorId(actor));
                assert_eq!(replayed, ok, "{kind} {node} by {actor} diverged");
            }

            let table = shared.table.lock().unwrap();
            assert_eq!(tree.locked_nodes(), table.locked_nodes());
            assert_eq!(tree.stats().total_attempts(), history.len() as u64);
            tree.check_invariants().unwrap();
        },
        ITERATIONS,
    );
}

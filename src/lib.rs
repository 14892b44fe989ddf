//! # `LockableTree`
//!
//! Hierarchical mutual exclusion over a fixed-shape tree.
//!
//! Actors lock named nodes of a tree. A lock on a node is only granted when
//! no ancestor and no descendant of that node is locked, so coarse and
//! fine-grained locks never overlap. An actor holding locks on several
//! descendants of a node can *upgrade*: trade all of them, atomically, for
//! one lock on that node.
//!
//! | Operation | Succeeds when |
//! |-----------|---------------|
//! | `lock(n, a)` | `n` unlocked, no locked descendant, no locked ancestor |
//! | `unlock(n, a)` | `n` locked by `a` |
//! | `upgrade(n, a)` | `n` unlocked, at least one locked descendant, all of them held by `a` |
//!
//! A refused operation returns `false` and changes nothing. Nothing ever
//! blocks waiting for a node to become free.
//!
//! ## Thread Safety
//!
//! [`LockableTree`] is `Send + Sync`. Each operation is one critical section
//! over the tree's lock table, so concurrent callers observe operations as
//! if they ran one at a time:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use lockable_tree::{ActorId, LockableTree};
//!
//! let names = ["root", "left", "right"];
//! let tree = Arc::new(LockableTree::m_ary(&names, 2).unwrap());
//!
//! let handles: Vec<_> = ["left", "right"]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, node)| {
//!         let tree = Arc::clone(&tree);
//!         thread::spawn(move || tree.lock(node, ActorId(i as u64)).unwrap())
//!     })
//!     .collect();
//!
//! for h in handles {
//!     assert!(h.join().unwrap());
//! }
//! assert_eq!(tree.locked_descendants("root").unwrap(), 2);
//! ```
//!
//! ## Design
//!
//! - [`topology`]: immutable arena of nodes linked by [`NodeId`] handles.
//! - [`index`]: read-only name lookup, built once.
//! - [`table`]: the lock algorithm on plain `&mut` state, with per-node
//!   counters of locked descendants maintained incrementally.
//! - [`tree`]: ties the three together behind one `parking_lot` mutex.
//! - [`driver`]: workload text format plus sequential and pooled execution.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod tracing_helpers;

pub mod driver;
pub mod error;
pub mod index;
pub mod request;
pub mod stats;
pub mod table;
pub mod topology;
pub mod tree;

// Re-export main types for convenience
pub use error::{BuildError, ConfigError, Error, InvariantViolation, ParseError, TreeError};
pub use index::NodeIndex;
pub use request::{OpKind, Outcome, Request};
pub use stats::OpStats;
pub use table::{ActorId, LockState, LockTable};
pub use topology::{NodeId, Topology};
pub use tree::LockableTree;

/// Environment variable naming a directory for NDJSON logs.
pub const LOG_DIR_VAR: &str = "LOCKTREE_LOG_DIR";

/// Install a global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). Console output is compact;
/// if [`LOG_DIR_VAR`] is set, events are also appended as NDJSON to
/// `lockable_tree.jsonl` in that directory. Calling it again is harmless.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use std::fs::OpenOptions;
    use std::path::PathBuf;

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    fn make_filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(true)
        .compact()
        .with_filter(make_filter());

    let file_layer = std::env::var_os(LOG_DIR_VAR)
        .map(PathBuf::from)
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("lockable_tree.jsonl"))
                .ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(make_filter())
        });

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// No-op without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

//! Operation counters.
//!
//! Relaxed atomics bumped after each operation. They are for diagnostics
//! only: a snapshot taken while operations are in flight is not a
//! consistent cut.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::request::OpKind;

/// Live counters owned by one tree.
#[derive(Debug, Default)]
pub struct OpCounters {
    lock_attempts: AtomicU64,
    lock_successes: AtomicU64,
    unlock_attempts: AtomicU64,
    unlock_successes: AtomicU64,
    upgrade_attempts: AtomicU64,
    upgrade_successes: AtomicU64,
    unknown_node: AtomicU64,
}

/// Plain copy of [`OpCounters`] at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    /// `lock` calls that reached a node.
    pub lock_attempts: u64,
    /// `lock` calls that returned true.
    pub lock_successes: u64,
    /// `unlock` calls that reached a node.
    pub unlock_attempts: u64,
    /// `unlock` calls that returned true.
    pub unlock_successes: u64,
    /// `upgrade` calls that reached a node.
    pub upgrade_attempts: u64,
    /// `upgrade` calls that returned true.
    pub upgrade_successes: u64,
    /// Calls rejected because the name was not in the index.
    pub unknown_node: u64,
}

impl OpStats {
    /// Attempts across all kinds.
    #[must_use]
    pub const fn total_attempts(&self) -> u64 {
        self.lock_attempts + self.unlock_attempts + self.upgrade_attempts
    }

    /// Successes across all kinds.
    #[must_use]
    pub const fn total_successes(&self) -> u64 {
        self.lock_successes + self.unlock_successes + self.upgrade_successes
    }
}

impl OpCounters {
    /// Record one completed operation.
    #[inline]
    pub fn record(&self, kind: OpKind, ok: bool) {
        let (attempts, successes) = match kind {
            OpKind::Lock => (&self.lock_attempts, &self.lock_successes),
            OpKind::Unlock => (&self.unlock_attempts, &self.unlock_successes),
            OpKind::Upgrade => (&self.upgrade_attempts, &self.upgrade_successes),
        };
        attempts.fetch_add(1, Ordering::Relaxed);
        if ok {
            successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request for a name the tree does not have.
    #[inline]
    pub fn record_unknown(&self) {
        self.unknown_node.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    #[must_use]
    pub fn snapshot(&self) -> OpStats {
        OpStats {
            lock_attempts: self.lock_attempts.load(Ordering::Relaxed),
            lock_successes: self.lock_successes.load(Ordering::Relaxed),
            unlock_attempts: self.unlock_attempts.load(Ordering::Relaxed),
            unlock_successes: self.unlock_successes.load(Ordering::Relaxed),
            upgrade_attempts: self.upgrade_attempts.load(Ordering::Relaxed),
            upgrade_successes: self.upgrade_successes.load(Ordering::Relaxed),
            unknown_node: self.unknown_node.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.lock_attempts,
            &self.lock_successes,
            &self.unlock_attempts,
            &self.unlock_successes,
            &self.upgrade_attempts,
            &self.upgrade_successes,
            &self.unknown_node,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

//! Error types.
//!
//! Lock operations themselves never fail with an error: a violated
//! precondition is an ordinary `false`. Errors are reserved for malformed
//! construction input, names the tree does not know, and driver I/O.

use thiserror::Error;

use crate::topology::NodeId;

/// Construction-time rejection. No tree is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The name list was empty; a tree needs at least a root.
    #[error("tree must contain at least one node")]
    Empty,

    /// Branching factor of zero cannot place any child.
    #[error("branching factor must be at least 1")]
    ZeroBranching,

    /// The same name appeared twice in the name list.
    #[error("duplicate node name '{name}' at positions {first} and {second}")]
    DuplicateName {
        /// The repeated name.
        name: String,
        /// Position of the first occurrence.
        first: usize,
        /// Position of the repeat.
        second: usize,
    },

    /// More nodes than a [`NodeId`] can address.
    #[error("{count} nodes exceeds the addressable limit of {max}")]
    TooManyNodes {
        /// Requested node count.
        count: usize,
        /// Largest supported node count.
        max: usize,
    },
}

/// Usage error raised by an operation on a built tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The node name is not present in the index.
    #[error("unknown node '{name}'")]
    UnknownNode {
        /// The name that failed to resolve.
        name: String,
    },
}

/// Malformed workload text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended before a required token.
    #[error("line {line}: expected {expected}, found end of input")]
    MissingToken {
        /// What the parser was looking for.
        expected: &'static str,
        /// Last line read.
        line: usize,
    },

    /// A token that should be an unsigned integer was not.
    #[error("line {line}: expected {expected}, found '{token}'")]
    InvalidNumber {
        /// What the parser was looking for.
        expected: &'static str,
        /// The offending token.
        token: String,
        /// Line of the token.
        line: usize,
    },

    /// Operation code other than `1`/`2`/`3` or `lock`/`unlock`/`upgrade`.
    #[error("line {line}: unknown operation '{token}'")]
    UnknownOpKind {
        /// The offending token.
        token: String,
        /// Line of the token.
        line: usize,
    },

    /// Tokens left over after the announced number of requests.
    #[error("line {line}: unexpected trailing input '{token}'")]
    TrailingInput {
        /// First extra token.
        token: String,
        /// Line of the token.
        line: usize,
    },
}

/// Malformed runtime configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be used.
    #[error("invalid value '{value}' for {var}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// A broken structural invariant, reported by
/// [`LockTable::check_invariants`](crate::table::LockTable::check_invariants).
///
/// Seeing one of these means the lock algorithm itself is wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Recorded descendant count disagrees with the live count.
    #[error("node {node}: recorded {recorded} locked descendants, found {actual}")]
    CountMismatch {
        /// Node whose counter is wrong.
        node: NodeId,
        /// Stored counter value.
        recorded: u32,
        /// Recomputed value.
        actual: u32,
    },

    /// A locked node has a locked ancestor.
    #[error("node {node} is locked beneath locked ancestor {ancestor}")]
    NestedLock {
        /// The inner locked node.
        node: NodeId,
        /// The locked ancestor above it.
        ancestor: NodeId,
    },
}

/// Top-level error for the driver binary.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Workload text was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Tree construction was rejected.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A request named an unknown node.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Environment configuration was malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

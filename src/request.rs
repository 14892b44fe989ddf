//! Operation requests.

use std::fmt as StdFmt;
use std::str::FromStr;

use thiserror::Error;

use crate::table::ActorId;

/// Which operation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Take a lock on the node.
    Lock,
    /// Release a lock the actor holds.
    Unlock,
    /// Absorb the actor's descendant locks into one lock on the node.
    Upgrade,
}

impl OpKind {
    /// All kinds, in wire-code order.
    pub const ALL: [Self; 3] = [Self::Lock, Self::Unlock, Self::Upgrade];

    /// Numeric code used by the workload format (`1`, `2`, `3`).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Lock => 1,
            Self::Unlock => 2,
            Self::Upgrade => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Lock),
            2 => Some(Self::Unlock),
            3 => Some(Self::Upgrade),
            _ => None,
        }
    }

    /// Lowercase keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Upgrade => "upgrade",
        }
    }
}

impl StdFmt::Display for OpKind {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from [`OpKind::from_str`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected 1, 2, 3, lock, unlock or upgrade")]
pub struct UnknownOpKind;

impl FromStr for OpKind {
    type Err = UnknownOpKind;

    /// Accepts the numeric code or the keyword, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or(UnknownOpKind);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownOpKind)
    }
}

/// One `(operation, node, actor)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Requested operation.
    pub kind: OpKind,
    /// Target node name.
    pub node: String,
    /// Requesting actor.
    pub actor: ActorId,
}

impl Request {
    /// Build a request.
    pub fn new(kind: OpKind, node: impl Into<String>, actor: impl Into<ActorId>) -> Self {
        Self {
            kind,
            node: node.into(),
            actor: actor.into(),
        }
    }
}

/// Result of one request as observed by a concurrent driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Position of the request in the submitted batch.
    pub index: usize,
    /// Operation performed.
    pub kind: OpKind,
    /// Whether it succeeded.
    pub ok: bool,
}

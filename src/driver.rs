//! Workload parsing and execution.
//!
//! A workload is the whitespace-separated text format
//!
//! ```text
//! N m Q
//! name_0 name_1 ... name_{N-1}
//! type name actor      (Q times; type is 1/2/3 or lock/unlock/upgrade)
//! ```
//!
//! Line breaks are not significant; they are only tracked for error
//! messages. Every request name is resolved before anything runs, so an
//! unknown name aborts the batch without having touched the tree.

use std::env::{self, VarError};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;

use crate::error::{BuildError, ConfigError, ParseError, TreeError};
use crate::request::{OpKind, Outcome, Request};
use crate::table::ActorId;
use crate::topology::NodeId;
use crate::tracing_helpers::debug_log;
use crate::tree::LockableTree;

// ============================================================================
//  Workload
// ============================================================================

/// Cap on presizing from header counts, which are untrusted.
const PRESIZE_LIMIT: usize = 1024;

/// Parsed workload: tree shape plus request stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Node names, root first.
    pub names: Vec<String>,
    /// Branching factor `m`.
    pub branching: usize,
    /// Requests in input order.
    pub requests: Vec<Request>,
}

impl Workload {
    /// Parse the text format described in the module docs.
    ///
    /// # Errors
    ///
    /// [`ParseError`] with the line of the offending token.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut tokens = Tokens::new(input);

        let node_count: usize = tokens.number("node count")?;
        let branching: usize = tokens.number("branching factor")?;
        let query_count: usize = tokens.number("request count")?;

        let mut names: Vec<String> = Vec::with_capacity(node_count.min(PRESIZE_LIMIT));
        for _ in 0..node_count {
            names.push(tokens.word("node name")?.to_owned());
        }

        let mut requests: Vec<Request> = Vec::with_capacity(query_count.min(PRESIZE_LIMIT));
        for _ in 0..query_count {
            let (line, raw_kind) = tokens.take("operation type")?;
            let kind: OpKind = raw_kind.parse().map_err(|_| ParseError::UnknownOpKind {
                token: raw_kind.to_owned(),
                line,
            })?;
            let node: &str = tokens.word("node name")?;
            let actor: u64 = tokens.number("actor id")?;
            requests.push(Request::new(kind, node, ActorId(actor)));
        }

        if let Some((line, extra)) = tokens.peek() {
            return Err(ParseError::TrailingInput {
                token: extra.to_owned(),
                line,
            });
        }

        debug_log!(
            nodes = names.len(),
            branching,
            requests = requests.len(),
            "parsed workload"
        );

        Ok(Self {
            names,
            branching,
            requests,
        })
    }

    /// Build the tree this workload describes.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`].
    pub fn build_tree(&self) -> Result<LockableTree, BuildError> {
        LockableTree::m_ary(&self.names, self.branching)
    }
}

/// Whitespace tokenizer that remembers line numbers.
struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: std::str::SplitWhitespace<'a>,
    line: usize,
    peeked: Option<(usize, &'a str)>,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
            current: "".split_whitespace(),
            line: 0,
            peeked: None,
        }
    }

    fn advance(&mut self) -> Option<(usize, &'a str)> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        loop {
            if let Some(token) = self.current.next() {
                return Some((self.line, token));
            }
            let (i, text) = self.lines.next()?;
            self.line = i + 1;
            self.current = text.split_whitespace();
        }
    }

    fn peek(&mut self) -> Option<(usize, &'a str)> {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked
    }

    fn take(&mut self, expected: &'static str) -> Result<(usize, &'a str), ParseError> {
        self.advance().ok_or(ParseError::MissingToken {
            expected,
            line: self.line,
        })
    }

    fn word(&mut self, expected: &'static str) -> Result<&'a str, ParseError> {
        self.take(expected).map(|(_, token)| token)
    }

    fn number<T: std::str::FromStr>(&mut self, expected: &'static str) -> Result<T, ParseError> {
        let (line, token) = self.take(expected)?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            expected,
            token: token.to_owned(),
            line,
        })
    }
}

// ============================================================================
//  Configuration
// ============================================================================

/// Environment variable selecting the worker count.
pub const THREADS_VAR: &str = "LOCKTREE_THREADS";

/// How the driver executes a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverConfig {
    /// Worker threads; `None` runs sequentially in request order.
    pub threads: Option<NonZeroUsize>,
}

impl DriverConfig {
    /// Read [`THREADS_VAR`]. Unset, empty or `0` means sequential.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVar`] if the value is not an unsigned integer
    /// or not valid unicode.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_var(env::var(THREADS_VAR))
    }

    fn from_var(var: Result<String, VarError>) -> Result<Self, ConfigError> {
        match var {
            Ok(raw) => Self::from_threads_value(&raw),
            Err(VarError::NotPresent) => Ok(Self::default()),
            Err(VarError::NotUnicode(raw)) => Err(ConfigError::InvalidVar {
                var: THREADS_VAR,
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }

    fn from_threads_value(raw: &str) -> Result<Self, ConfigError> {
        let trimmed: &str = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let threads: usize = trimmed.parse().map_err(|_| ConfigError::InvalidVar {
            var: THREADS_VAR,
            value: raw.to_owned(),
        })?;
        Ok(Self {
            threads: NonZeroUsize::new(threads),
        })
    }
}

// ============================================================================
//  Execution
// ============================================================================

/// A request with its node already resolved.
#[derive(Debug, Clone, Copy)]
struct Resolved {
    kind: OpKind,
    id: NodeId,
    actor: ActorId,
}

fn resolve_all(tree: &LockableTree, requests: &[Request]) -> Result<Vec<Resolved>, TreeError> {
    requests
        .iter()
        .map(|r| {
            tree.resolve(&r.node).map(|id| Resolved {
                kind: r.kind,
                id,
                actor: r.actor,
            })
        })
        .collect()
}

/// Run `requests` one after another; results are in request order.
///
/// # Errors
///
/// [`TreeError::UnknownNode`] for the first unknown name. Nothing runs in
/// that case.
pub fn run_sequential(tree: &LockableTree, requests: &[Request]) -> Result<Vec<bool>, TreeError> {
    let resolved: Vec<Resolved> = resolve_all(tree, requests)?;
    Ok(resolved
        .iter()
        .map(|r| tree.apply_id(r.kind, r.id, r.actor))
        .collect())
}

/// Run `requests` on a pool of `threads` scoped workers.
///
/// Workers claim requests from a shared cursor, so every request runs
/// exactly once. Outcomes are returned in completion order; nothing orders
/// one actor's requests relative to another's.
///
/// # Errors
///
/// [`TreeError::UnknownNode`] for the first unknown name. Nothing runs in
/// that case.
pub fn run_concurrent(
    tree: &LockableTree,
    requests: &[Request],
    threads: NonZeroUsize,
) -> Result<Vec<Outcome>, TreeError> {
    let resolved: Vec<Resolved> = resolve_all(tree, requests)?;
    let workers: usize = threads.get().min(resolved.len().max(1));

    let cursor = AtomicUsize::new(0);
    let outcomes: Mutex<Vec<Outcome>> = Mutex::new(Vec::with_capacity(resolved.len()));

    debug_log!(workers, requests = resolved.len(), "starting concurrent run");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let index: usize = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(r) = resolved.get(index) else {
                        break;
                    };
                    let ok: bool = tree.apply_id(r.kind, r.id, r.actor);
                    outcomes.lock().push(Outcome {
                        index,
                        kind: r.kind,
                        ok,
                    });
                }
            });
        }
    });

    Ok(outcomes.into_inner())
}

/// Run per `config`: request order when sequential, completion order
/// otherwise. Every [`Outcome`] carries its request index.
///
/// # Errors
///
/// [`TreeError::UnknownNode`] for the first unknown name.
pub fn run(
    tree: &LockableTree,
    requests: &[Request],
    config: DriverConfig,
) -> Result<Vec<Outcome>, TreeError> {
    match config.threads {
        None => Ok(run_sequential(tree, requests)?
            .into_iter()
            .zip(requests)
            .enumerate()
            .map(|(index, (ok, r))| Outcome {
                index,
                kind: r.kind,
                ok,
            })
            .collect()),
        Some(threads) => run_concurrent(tree, requests, threads),
    }
}

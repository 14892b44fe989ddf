//! Common test utilities with comprehensive tracing setup.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `lockable_tree=debug,lockable_tree::table=trace`)
//! - `LOCKTREE_LOG_DIR`: Log directory (default: `logs/`)
//! - `LOCKTREE_LOG_CONSOLE`: Set to "0" to disable console output
//!
//! Library events only appear when the crate is built with `--features tracing`.
//!
//! # Log Files
//!
//! Logs are written to `logs/lockable_tree_tests.jsonl` as newline-delimited JSON:
//!
//! ```bash
//! # Every refused upgrade
//! cat logs/lockable_tree_tests.jsonl | jq 'select(.fields.message | startswith("upgrade refused"))'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use lockable_tree::{ActorId, LockableTree, NodeId};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Node names of the reference scenario, binary layout.
pub const WORLD: [&str; 7] = ["World", "Asia", "Europe", "China", "India", "Russia", "Italy"];

/// Initialize the tracing subscriber with file and console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        setup_tracing();
    });
}

/// Configuration for tracing setup.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Log file name.
    pub log_file: String,
    /// Enable console output.
    pub console_enabled: bool,
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "lockable_tree_tests.jsonl".to_string(),
            console_enabled: true,
            default_level: Level::INFO,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var(lockable_tree::LOG_DIR_VAR) {
            config.log_dir = PathBuf::from(dir);
        }

        if env::var("LOCKTREE_LOG_CONSOLE").is_ok_and(|v| v == "0") {
            config.console_enabled = false;
        }

        config
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

#[allow(clippy::expect_used)]
fn setup_tracing() {
    let config = TracingConfig::from_env();

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");

    let log_path = config.log_dir.join(&config.log_file);

    // Append mode: nextest runs tests in separate processes
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let console_layer = if config.console_enabled {
        Some(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .compact()
                .with_filter(make_filter(config.default_level)),
        )
    } else {
        None
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .with_filter(make_filter(config.default_level));

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// =============================================================================
// Tree helpers
// =============================================================================

/// The seven-node binary world tree.
pub fn world() -> LockableTree {
    LockableTree::m_ary(&WORLD, 2).unwrap()
}

/// Tree of `n` nodes named `n0..n{n-1}` with branching `m`.
pub fn numbered(n: usize, m: usize) -> LockableTree {
    let names: Vec<String> = (0..n).map(node_name).collect();
    LockableTree::m_ary(&names, m).unwrap()
}

/// Name of node `i` in a [`numbered`] tree.
pub fn node_name(i: usize) -> String {
    format!("n{i}")
}

/// Panic unless no locked node has a locked ancestor or descendant and
/// every counter matches a full recount.
pub fn assert_quiescent_invariants(tree: &LockableTree) {
    if let Err(violation) = tree.check_invariants() {
        panic!("invariant violated: {violation}");
    }

    let topology = tree.topology();
    let locked: Vec<(NodeId, ActorId)> = tree.locked_nodes();
    for &(a, _) in &locked {
        for &(b, _) in &locked {
            assert!(
                a == b || !topology.is_ancestor(a, b),
                "{} is locked above locked {}",
                topology.name(a),
                topology.name(b)
            );
        }
    }
}

//! Lock Contention Profiling Binary
//!
//! Hammers one tree from many actors and reports per-operation latency
//! outliers together with the tree's own success counters. Slow operations
//! are logged as `SLOW_OP` events when tracing is enabled.
//!
//! Run with:
//! ```bash
//! # Without tracing (fast, just stats)
//! cargo run --release --bin lock_contention
//!
//! # With tracing (NDJSON in logs/lockable_tree.jsonl)
//! LOCKTREE_LOG_DIR=logs RUST_LOG=lock_contention=warn cargo run --release --features tracing --bin lock_contention
//!
//! # View slow operations:
//! rg "SLOW_OP" logs/lockable_tree.jsonl
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use lockable_tree::{ActorId, LockableTree, NodeId, OpKind, OpStats};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// =============================================================================
// Operation Stats (Thread-Local + Aggregation)
// =============================================================================

/// Per-thread operation timing statistics
#[derive(Default)]
struct ThreadOpStats {
    /// Longest operation overall
    max_op_ns: u64,

    /// Sum of all operation times
    total_op_ns: u64,

    /// Operations timed
    ops: u64,

    /// Number of slow ops (>100us)
    slow_ops_100us: u64,

    /// Number of very slow ops (>1ms)
    slow_ops_1ms: u64,

    /// Number of extremely slow ops (>10ms)
    slow_ops_10ms: u64,
}

impl ThreadOpStats {
    const fn record_op(&mut self, op_ns: u64) {
        if op_ns > self.max_op_ns {
            self.max_op_ns = op_ns;
        }
        self.total_op_ns += op_ns;
        self.ops += 1;

        if op_ns > 100_000 {
            self.slow_ops_100us += 1;
        }

        if op_ns > 1_000_000 {
            self.slow_ops_1ms += 1;
        }

        if op_ns > 10_000_000 {
            self.slow_ops_10ms += 1;
        }
    }

    const fn merge(&mut self, other: &Self) {
        if other.max_op_ns > self.max_op_ns {
            self.max_op_ns = other.max_op_ns;
        }

        self.total_op_ns += other.total_op_ns;
        self.ops += other.ops;
        self.slow_ops_100us += other.slow_ops_100us;
        self.slow_ops_1ms += other.slow_ops_1ms;
        self.slow_ops_10ms += other.slow_ops_10ms;
    }
}

// =============================================================================
// Benchmark Runner
// =============================================================================

struct BenchmarkConfig {
    threads: usize,
    ops_per_thread: usize,
    nodes: usize,
    branching: usize,
}

struct RunResult {
    elapsed: Duration,
    stats: ThreadOpStats,
    tree: OpStats,
}

fn build_tree(config: &BenchmarkConfig) -> LockableTree {
    let names: Vec<String> = (0..config.nodes).map(|i| format!("n{i}")).collect();
    LockableTree::m_ary(&names, config.branching).unwrap()
}

#[expect(clippy::indexing_slicing)]
fn run_benchmark(config: &BenchmarkConfig) -> RunResult {
    let tree = Arc::new(build_tree(config));
    let ids: Arc<[NodeId]> = tree.topology().ids().collect();

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let tree = Arc::clone(&tree);
            let ids = Arc::clone(&ids);
            let ops = config.ops_per_thread;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();
                let actor = ActorId(t as u64);
                let mut state: u64 = (t as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
                let mut held: Vec<NodeId> = Vec::new();

                for i in 0..ops {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1);
                    let pick = (state >> 33) as usize;

                    // Mostly lock/unlock pairs, with an upgrade every few ops.
                    let (kind, node) = match pick % 8 {
                        0..=3 => (OpKind::Lock, ids[pick % ids.len()]),
                        4..=6 if !held.is_empty() => {
                            (OpKind::Unlock, held.swap_remove(pick % held.len()))
                        }
                        _ => (OpKind::Upgrade, ids[pick % ids.len()]),
                    };

                    let op_start = Instant::now();
                    let ok = tree.apply_id(kind, node, actor);
                    let op_elapsed = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_elapsed);

                    if ok {
                        match kind {
                            OpKind::Lock => held.push(node),
                            OpKind::Unlock => {}
                            OpKind::Upgrade => {
                                let topo = tree.topology();
                                held.retain(|&h| !topo.is_ancestor(node, h));
                                held.push(node);
                            }
                        }
                    }

                    // Log extremely slow operations in real-time
                    if op_elapsed > 10_000_000 {
                        // >10ms
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            thread = t,
                            op_index = i,
                            op = %kind,
                            node = %node,
                            elapsed_ms = op_elapsed as f64 / 1_000_000.0,
                            "SLOW_OP"
                        );

                        #[cfg(not(feature = "tracing"))]
                        eprintln!(
                            "[T{:02}] SLOW_OP: i={} {} {} took {:.2}ms",
                            t,
                            i,
                            kind,
                            node,
                            op_elapsed as f64 / 1_000_000.0
                        );
                    }
                }

                for node in held {
                    assert!(tree.unlock_id(node, actor));
                }

                stats
            })
        })
        .collect();

    // Collect and merge stats
    let mut merged = ThreadOpStats::default();
    for h in handles {
        let thread_stats = h.join().unwrap();
        merged.merge(&thread_stats);
    }

    let elapsed = start.elapsed();
    assert_eq!(tree.locked_count(), 0);
    tree.check_invariants().unwrap();

    RunResult {
        elapsed,
        stats: merged,
        tree: tree.stats(),
    }
}

fn rate(successes: u64, attempts: u64) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        successes as f64 * 100.0 / attempts as f64
    }
}

fn print_stats(config: &BenchmarkConfig, result: &RunResult, baseline: Duration) {
    let elapsed = result.elapsed;
    let stats = &result.stats;
    let tree = &result.tree;

    let total_ops = config.threads * config.ops_per_thread;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("\n{}", "=".repeat(80));
    println!(
        "RESULTS: {} threads x {} ops = {} total ({} nodes, m={})",
        config.threads, config.ops_per_thread, total_ops, config.nodes, config.branching
    );
    println!("{}", "=".repeat(80));

    println!("\n--- Timing ---");
    println!("Elapsed:     {elapsed:?}");
    println!("Throughput:  {ops_per_sec:.0} ops/sec");

    println!("\n--- Operation Latency ---");
    let avg_ns = if stats.ops == 0 {
        0.0
    } else {
        stats.total_op_ns as f64 / stats.ops as f64
    };
    println!("Avg op:      {avg_ns:.0} ns");
    println!("Max op:      {:.2} ms", stats.max_op_ns as f64 / 1_000_000.0);
    println!("Slow >100us: {}", stats.slow_ops_100us);
    println!("Slow >1ms:   {}", stats.slow_ops_1ms);
    println!("Slow >10ms:  {}", stats.slow_ops_10ms);

    println!("\n--- Tree Counters ---");
    for kind in OpKind::ALL {
        let (ok, all) = match kind {
            OpKind::Lock => (tree.lock_successes, tree.lock_attempts),
            OpKind::Unlock => (tree.unlock_successes, tree.unlock_attempts),
            OpKind::Upgrade => (tree.upgrade_successes, tree.upgrade_attempts),
        };
        println!("{:<8} {ok:>10} / {all:<10} ({:.1}% granted)", kind.as_str(), rate(ok, all));
    }

    let baseline_ms = baseline.as_secs_f64() * 1000.0;
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if baseline_ms > 0.0 && elapsed_ms > baseline_ms * 3.0 {
        let ratio = elapsed_ms / baseline_ms;
        println!("\n!!! OUTLIER DETECTED: This run was ~{ratio:.1}x slower than median");
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    lockable_tree::init_tracing();

    println!("Lock Contention Profiling");
    println!("=========================\n");

    let configs = vec![
        BenchmarkConfig {
            threads: 8,
            ops_per_thread: 100_000,
            nodes: 1_023,
            branching: 2,
        },
        BenchmarkConfig {
            threads: 32,
            ops_per_thread: 50_000,
            nodes: 100_000,
            branching: 8,
        },
    ];

    for config in &configs {
        println!(
            "\nRunning: {} threads x {} ops ({} nodes, m={})...",
            config.threads, config.ops_per_thread, config.nodes, config.branching
        );

        // Run multiple iterations to catch outliers
        let mut results: Vec<RunResult> = Vec::new();
        for run in 1..=5 {
            print!("  Run {run}/5... ");
            std::io::Write::flush(&mut std::io::stdout()).unwrap();

            let result = run_benchmark(config);
            println!("{:?}", result.elapsed);

            results.push(result);
        }

        #[expect(clippy::indexing_slicing)]
        let baseline = {
            let mut sorted: Vec<Duration> = results.iter().map(|result| result.elapsed).collect();
            sorted.sort_by_key(Duration::as_nanos);
            sorted[sorted.len() / 2]
        };

        let (slowest_idx, slowest_result) = results
            .iter()
            .enumerate()
            .max_by_key(|(_, result)| result.elapsed.as_nanos())
            .unwrap();

        println!("\n>>> Slowest run was #{} <<<", slowest_idx + 1);
        println!("Baseline (median) run: {baseline:?}");
        print_stats(config, slowest_result, baseline);

        let (fastest_idx, fastest_result) = results
            .iter()
            .enumerate()
            .min_by_key(|(_, result)| result.elapsed.as_nanos())
            .unwrap();

        println!(
            "\nFastest run #{}: {:?} (ratio: {:.1}x)",
            fastest_idx + 1,
            fastest_result.elapsed,
            slowest_result.elapsed.as_secs_f64() / fastest_result.elapsed.as_secs_f64()
        );
    }
}

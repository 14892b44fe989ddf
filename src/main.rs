//! Workload runner.
//!
//! Reads a workload from stdin and prints one `true`/`false` per request.
//!
//! Run with:
//! ```bash
//! # Sequential, results in request order
//! cargo run < workload.txt
//!
//! # Four worker threads, results in completion order
//! LOCKTREE_THREADS=4 cargo run < workload.txt
//!
//! # With lock decisions logged
//! RUST_LOG=lockable_tree=trace cargo run --features tracing < workload.txt
//! ```

use std::io::{self, BufWriter, Read, Write};
use std::process::ExitCode;

use lockable_tree::driver::{self, DriverConfig, Workload};
use lockable_tree::{Error, LockableTree};

fn run() -> Result<(), Error> {
    let config: DriverConfig = DriverConfig::from_env()?;

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let workload: Workload = Workload::parse(&input)?;
    let tree: LockableTree = workload.build_tree()?;
    let outcomes = driver::run(&tree, &workload.requests, config)?;

    let mut out = BufWriter::new(io::stdout().lock());
    for outcome in &outcomes {
        writeln!(out, "{}", outcome.ok)?;
    }
    out.flush()?;

    Ok(())
}

fn main() -> ExitCode {
    lockable_tree::init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

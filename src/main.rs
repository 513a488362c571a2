//! Interactive console over a product ledger persisted to a JSON file.
//!
//! Every action that touches the whole ledger (mining a new record,
//! validating, searching, computing statistics) is split across a pool of
//! worker threads, one per available core unless `--threads` says otherwise.

use clap::Parser;
use product_ledger::config::Args;
use product_ledger::console::Console;
use product_ledger::{JsonFileStore, Ledger};
use std::io;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> eyre::Result<()> {
    // Logs go to stderr so prompts and results on stdout stay readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.ledger_config()?;

    info!(
        target: "ledger::console",
        workers = config.workers,
        difficulty = config.difficulty,
        strategy = ?config.strategy,
        store = %args.store.display(),
        "Product ledger starting"
    );

    let ledger = Ledger::open(config, JsonFileStore::new(&args.store))?;
    let stdin = io::stdin();
    let mut console = Console::new(ledger, stdin.lock(), io::stdout());

    if let Err(e) = console.run() {
        error!(target: "ledger::console", error = %e, "Console terminated by an error");
        return Err(e.into());
    }
    Ok(())
}

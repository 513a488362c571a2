//! Product revision ledger sealed by parallel proof of work.
//!
//! The ledger is an append-only, hash-linked sequence of product revisions.
//! Each new record is sealed by a pool of threads racing to find a nonce whose
//! SHA-256 digest starts with a configured number of zero hex characters.
//! Validation, search and price statistics split the ledger across the same
//! kind of short-lived pool and reduce the per-worker results on the calling
//! thread.
//!
//! ```text
//!   Console ──▶ Ledger ──▶ Miner ──▶ workers::run ──▶ digest
//!                 │                      ▲
//!                 ├── validate / search ─┘
//!                 └── LedgerStore (JSON file)
//! ```

pub mod config;
pub mod console;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod miner;
pub mod record;
pub mod store;
pub mod workers;

pub use config::{LedgerConfig, NonceStrategy};
pub use error::{ConsoleError, LedgerError, MiningError, StoreError};
pub use ledger::{Ledger, PricePoint, ProductStatistics, SearchQuery, Validation, Violation};
pub use miner::{Miner, Seal};
pub use record::{Record, Revision};
pub use store::{JsonFileStore, LedgerStore};
pub use workers::Partition;

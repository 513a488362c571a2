//! The product ledger: an append-only, hash-linked sequence of sealed records.
//!
//! Every operation that reads the whole ledger is a partitioned parallel
//! pass: the records are split with [`Partition`], each worker scans its own
//! share, and the per-worker results are reduced on the calling thread.

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::miner::Miner;
use crate::record::{Record, Revision};
use crate::store::LedgerStore;
use crate::workers::{self, Partition, PoolOutcome};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// An ordered sequence of sealed records backed by a store.
pub struct Ledger {
    records: Vec<Record>,
    config: LedgerConfig,
    store: Box<dyn LedgerStore>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("records", &self.records.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Ledger {
    /// Open the ledger held by `store`.
    ///
    /// A store with nothing in it, or one that cannot be read or parsed,
    /// yields an empty ledger. Both are normal startup conditions and are
    /// only logged.
    pub fn open(config: LedgerConfig, store: impl LedgerStore + 'static) -> Result<Self> {
        config.validate()?;

        let records = match store.load() {
            Ok(Some(records)) => {
                info!(target: "ledger::chain", records = records.len(), "Loaded stored ledger");
                records
            }
            Ok(None) => {
                info!(target: "ledger::chain", "No stored ledger found, starting a new one");
                Vec::new()
            }
            Err(e) => {
                warn!(target: "ledger::chain", error = %e, "Stored ledger unreadable, starting a new one");
                Vec::new()
            }
        };

        Ok(Self {
            records,
            config,
            store: Box::new(store),
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn partition(&self, id: usize) -> Partition {
        Partition::of(self.records.len(), self.config.workers, id)
    }

    /// Run `scan` over every worker's partition, failing if any worker did not
    /// complete.
    fn scan<T, F>(&self, operation: &'static str, scan: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(Partition) -> T + Sync,
    {
        let PoolOutcome { results, failures } = workers::run(self.config.workers, |id| scan(self.partition(id)));
        if !failures.is_empty() {
            return Err(LedgerError::WorkerFailed {
                operation,
                workers: failures.into_iter().map(|f| f.id).collect(),
            });
        }
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }

    /// Seal a new revision and append it.
    ///
    /// The record links to the current last record and to the latest earlier
    /// revision of the same product code. Negative, NaN and infinite prices
    /// are rejected with [`LedgerError::InvalidPrice`] before anything is
    /// mined. After the in-memory append the whole
    /// ledger is saved; a save failure is returned but the record stays
    /// appended.
    pub fn append(&mut self, revision: Revision) -> Result<&Record> {
        // JSON has no encoding for NaN or infinity.
        if !revision.price.is_finite() || revision.price < 0.0 {
            return Err(LedgerError::InvalidPrice {
                product_code: revision.product_code,
                price: revision.price,
            });
        }

        let previous_revision_index = self
            .latest_revision(&revision.product_code)?
            .map(|r| r.index);
        let previous_hash = self.records.last().map(|r| r.hash.clone());
        let index = self.records.len() as u64;

        let mut record = Record::new(previous_hash, index, revision, previous_revision_index);
        record.seal(&Miner::from_config(&self.config))?;

        info!(
            target: "ledger::chain",
            index,
            product = %record.product_code,
            previous_revision = ?previous_revision_index,
            "Record appended, saving ledger"
        );
        self.records.push(record);

        self.store.save(&self.records)?;
        Ok(&self.records[self.records.len() - 1])
    }

    /// Append `revisions` in order, stopping at the first failure.
    ///
    /// Returns how many records were appended.
    pub fn append_many(&mut self, revisions: impl IntoIterator<Item = Revision>) -> Result<usize> {
        let mut appended = 0;
        for revision in revisions {
            self.append(revision)?;
            appended += 1;
        }
        Ok(appended)
    }

    /// The highest-index record carrying `product_code`, if any.
    pub fn latest_revision(&self, product_code: &str) -> Result<Option<&Record>> {
        let candidates = self.scan("latest revision lookup", |part| {
            // Each worker keeps the newest match in its own partition.
            part.select(&self.records)
                .filter(|r| r.product_code == product_code)
                .max_by_key(|r| r.index)
        })?;

        // Reduce the per-worker candidates on the calling thread.
        Ok(candidates.into_iter().flatten().max_by_key(|r| r.index))
    }

    /// Check every record's hash, linkage, proof of work, position and
    /// revision link.
    ///
    /// All records are checked even after a violation is found, so one pass
    /// reports every problem.
    pub fn validate(&self) -> Validation {
        let difficulty = self.config.difficulty;
        // Only ever flipped to false.
        let valid = AtomicBool::new(true);

        let outcome = workers::run(self.config.workers, |id| {
            let mut found = Vec::new();
            // Keep checking after a failure so every violation is reported.
            for position in self.partition(id).indices() {
                for violation in self.check_record(position, difficulty) {
                    warn!(target: "ledger::chain", %violation, "Validation failed");
                    valid.store(false, Ordering::Relaxed);
                    found.push(violation);
                }
            }
            found
        });

        let mut violations: Vec<Violation> = outcome.results.into_iter().flat_map(|(_, v)| v).collect();
        // A worker that did not finish leaves its partition unchecked.
        for failure in outcome.failures {
            valid.store(false, Ordering::Relaxed);
            violations.push(Violation::WorkerFailed { worker: failure.id });
        }

        let validation = Validation {
            valid: valid.into_inner(),
            violations,
        };
        info!(
            target: "ledger::chain",
            records = self.records.len(),
            valid = validation.valid,
            violations = validation.violations.len(),
            "Ledger validated"
        );
        validation
    }

    fn check_record(&self, position: usize, difficulty: usize) -> Vec<Violation> {
        let mut violations = Vec::new();
        let Some(record) = self.records.get(position) else {
            return violations;
        };
        let index = record.index;

        if !record.hash_is_intact() {
            violations.push(Violation::HashMismatch { index });
        }

        let linked = match position.checked_sub(1).and_then(|p| self.records.get(p)) {
            Some(previous) => record.previous_hash.as_deref() == Some(previous.hash.as_str()),
            None => record.previous_hash.is_none(),
        };
        if !linked {
            violations.push(Violation::BrokenLink { index });
        }

        if !record.is_sealed(difficulty) {
            violations.push(Violation::Unsealed { index });
        }

        if index != position as u64 {
            violations.push(Violation::IndexMismatch { position, index });
        }

        if let Some(target) = record.previous_revision_index {
            let points_back = target < index
                && self
                    .records
                    .get(target as usize)
                    .is_some_and(|r| r.product_code == record.product_code);
            if !points_back {
                violations.push(Violation::BrokenRevisionLink { index, target });
            }
        }

        violations
    }

    /// Records matching every non-empty filter, one per product code within
    /// each worker's partition.
    ///
    /// Results from different workers are concatenated without merging, so a
    /// product whose revisions span several partitions can appear more than
    /// once.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<&Record>> {
        let per_worker = self.scan("search", |part| {
            // One record per product code, chosen by `retrieve_latest`.
            let mut by_code: HashMap<&str, &Record> = HashMap::new();
            for record in part.select(&self.records).filter(|r| query.matches(r)) {
                by_code
                    .entry(record.product_code.as_str())
                    .and_modify(|kept| *kept = query.pick(*kept, record))
                    .or_insert(record);
            }
            let mut found: Vec<&Record> = by_code.into_values().collect();
            found.sort_by_key(|r| r.index);
            found
        })?;

        // Concatenate in worker order.
        let found: Vec<&Record> = per_worker.into_iter().flatten().collect();
        info!(target: "ledger::chain", results = found.len(), "Search finished");
        Ok(found)
    }

    /// Price statistics over the full revision history of `product_code`.
    ///
    /// Returns `None` if the product has never been recorded.
    pub fn statistics(&self, product_code: &str) -> Result<Option<ProductStatistics>> {
        let Some(latest) = self.latest_revision(product_code)? else {
            return Ok(None);
        };

        // Walk the revision links back from the newest revision.
        let mut history = Vec::new();
        let mut current = latest;
        loop {
            history.push(PricePoint {
                index: current.index,
                timestamp: current.timestamp,
                price: current.price,
            });

            let Some(target) = current.previous_revision_index else {
                break;
            };
            // Indices strictly decrease, so the walk always ends.
            current = self
                .records
                .get(target as usize)
                .filter(|r| r.index == target && target < current.index && r.product_code == current.product_code)
                .ok_or(LedgerError::BrokenRevisionChain {
                    index: current.index,
                    target,
                })?;
        }

        let revisions = history.len();
        let sum: f64 = history.iter().map(|p| p.price).sum();
        let max_price = history.iter().map(|p| p.price).fold(f64::MIN, f64::max);
        let min_price = history.iter().map(|p| p.price).fold(f64::MAX, f64::min);

        Ok(Some(ProductStatistics {
            latest: latest.clone(),
            revisions,
            median_price: sum / revisions as f64,
            max_price,
            min_price,
            history,
        }))
    }
}

/// A broken ledger invariant found by [`Ledger::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The stored hash does not match the record's fields and nonce
    HashMismatch { index: u64 },
    /// `previous_hash` does not match the preceding record
    BrokenLink { index: u64 },
    /// The hash does not meet the difficulty
    Unsealed { index: u64 },
    /// The record's index differs from its position in the ledger
    IndexMismatch { position: usize, index: u64 },
    /// The previous revision link is not an earlier record of the same product
    BrokenRevisionLink { index: u64, target: u64 },
    /// The worker checking a partition did not complete
    WorkerFailed { worker: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::HashMismatch { index } => write!(f, "record {index}: stored hash does not match its content"),
            Violation::BrokenLink { index } => write!(f, "record {index}: previous hash does not match the preceding record"),
            Violation::Unsealed { index } => write!(f, "record {index}: hash has not been mined"),
            Violation::IndexMismatch { position, index } => {
                write!(f, "record at position {position} carries index {index}")
            }
            Violation::BrokenRevisionLink { index, target } => {
                write!(f, "record {index}: previous revision {target} is not an earlier revision of the same product")
            }
            Violation::WorkerFailed { worker } => write!(f, "worker {worker} did not finish its checks"),
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone)]
pub struct Validation {
    valid: bool,
    pub violations: Vec<Violation>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Substring filters for [`Ledger::search`]. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub product_code: String,
    pub title: String,
    pub category: String,
    pub description: String,
    /// When two matches share a product code within one partition, `true`
    /// keeps the one with the smaller index and `false` the larger.
    pub retrieve_latest: bool,
}

impl SearchQuery {
    fn matches(&self, record: &Record) -> bool {
        record.product_code.contains(&self.product_code)
            && record.title.contains(&self.title)
            && record.category.contains(&self.category)
            && record.description.contains(&self.description)
    }

    fn pick<'a>(&self, kept: &'a Record, candidate: &'a Record) -> &'a Record {
        let keep_smaller = self.retrieve_latest;
        if (kept.index < candidate.index) == keep_smaller {
            kept
        } else {
            candidate
        }
    }
}

/// One entry of a product's price history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub index: u64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub price: f64,
}

/// Price statistics over a product's revision back-chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductStatistics {
    /// The most recent revision
    pub latest: Record,
    pub revisions: usize,
    /// Arithmetic mean of every revision's price, reported as the median
    pub median_price: f64,
    pub max_price: f64,
    pub min_price: f64,
    /// Newest first
    pub history: Vec<PricePoint>,
}

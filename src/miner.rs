//! Parallel proof-of-work sealing.
//!
//! A pool of workers races to find a nonce whose record digest starts with
//! `difficulty` zero hex characters. The record's `(hash, nonce)` pair is the
//! only shared mutable state: it sits behind a mutex and is written at most
//! once, by the first worker to lock it while it is still unsolved. An atomic
//! flag lets the other workers notice the win without taking the lock.

use crate::config::{LedgerConfig, NonceStrategy};
use crate::digest::meets_difficulty;
use crate::error::MiningError;
use crate::record::Record;
use crate::workers;
use rand::rngs::ThreadRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A winning `(hash, nonce)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub hash: String,
    pub nonce: u64,
}

/// What a single mining worker did before it stopped.
#[derive(Debug, Clone)]
struct Attempt {
    /// Whether this worker wrote the shared seal
    committed: bool,
    hashes: u64,
    /// The winning pair this worker computed, committed or not
    found: Option<Seal>,
}

/// Races a pool of workers to seal one record.
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    difficulty: usize,
    workers: usize,
    strategy: NonceStrategy,
}

impl Miner {
    pub fn new(difficulty: usize, workers: usize, strategy: NonceStrategy) -> Self {
        Self {
            difficulty,
            workers,
            strategy,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.difficulty, config.workers, config.strategy)
    }

    /// Find a seal for `record` without modifying it.
    ///
    /// # Returns
    ///
    /// The pair committed by the winning worker. If the record's current hash
    /// already meets the difficulty, no worker commits and the current pair is
    /// returned unchanged.
    ///
    /// # Details
    ///
    /// 1. Starts `workers` threads, each walking the nonce space according to
    ///    the configured [`NonceStrategy`].
    /// 2. Each thread stops as soon as its own hash meets the target, or the
    ///    solved flag shows another thread already won.
    /// 3. A thread holding a winning hash locks the shared seal and commits
    ///    only if it is still unsolved.
    /// 4. Returns once every thread has been joined.
    pub fn mine(&self, record: &Record) -> Result<Seal, MiningError> {
        self.race(record).map(|(seal, _)| seal)
    }

    /// Run the race and return the final seal with every joined worker's
    /// attempt, in worker id order.
    fn race(&self, record: &Record) -> Result<(Seal, Vec<(usize, Attempt)>), MiningError> {
        if self.difficulty > 64 {
            return Err(MiningError::DifficultyTooHigh(self.difficulty));
        }

        let start = Instant::now();
        let shared = Mutex::new(Seal {
            hash: record.hash.clone(),
            nonce: record.nonce,
        });
        let solved = AtomicBool::new(meets_difficulty(&record.hash, self.difficulty));

        info!(
            target: "ledger::miner",
            record = record.index,
            difficulty = self.difficulty,
            workers = self.workers,
            strategy = ?self.strategy,
            "Starting mining"
        );

        let outcome = workers::run(self.workers, |id| {
            self.search(record, id, &shared, &solved)
        });

        if !outcome.is_complete() {
            warn!(
                target: "ledger::miner",
                record = record.index,
                failed = ?outcome.failed_ids(),
                "Some miners failed"
            );
        }

        let seal = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !meets_difficulty(&seal.hash, self.difficulty) {
            return Err(MiningError::Unsolved {
                index: record.index,
            });
        }

        let hashes: u64 = outcome.results.iter().map(|(_, a)| a.hashes).sum();
        let winner = outcome
            .results
            .iter()
            .find(|(_, a)| a.committed)
            .map(|(id, _)| *id);
        let duration = start.elapsed();

        info!(
            target: "ledger::miner",
            record = record.index,
            winner = ?winner,
            nonce = seal.nonce,
            hash = %seal.hash,
            hashes,
            duration_ms = duration.as_millis() as u64,
            hashrate = hashes as f64 / duration.as_secs_f64().max(f64::EPSILON),
            "Record sealed"
        );

        Ok((seal, outcome.results))
    }

    /// The loop each mining worker runs.
    fn search(&self, record: &Record, id: usize, shared: &Mutex<Seal>, solved: &AtomicBool) -> Attempt {
        let mut nonces = NonceWalk::new(self.strategy, id, self.workers);
        let mut hashes = 0u64;

        loop {
            // Someone else already won.
            if solved.load(Ordering::Acquire) {
                return Attempt {
                    committed: false,
                    hashes,
                    found: None,
                };
            }

            // Try the next nonce of this worker's walk.
            let nonce = nonces.advance();
            let hash = record.compute_hash(nonce);
            hashes += 1;

            if meets_difficulty(&hash, self.difficulty) {
                let found = Seal { hash, nonce };
                // Lock the shared seal; only a worker that finds it still
                // unsolved commits.
                let mut seal = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let committed = !meets_difficulty(&seal.hash, self.difficulty);
                if committed {
                    *seal = found.clone();
                    // Tell the other workers to stop.
                    solved.store(true, Ordering::Release);
                }
                debug!(
                    target: "ledger::miner",
                    worker = id,
                    nonce,
                    committed,
                    hashes,
                    "Miner found a solution"
                );
                return Attempt {
                    committed,
                    hashes,
                    found: Some(found),
                };
            }
        }
    }
}

/// The sequence of nonces one worker tries.
enum NonceWalk {
    /// `0, 1, 2, ...`
    Sequential { next: u64 },
    /// Starts at and advances by random draws scaled by the worker id. A zero
    /// draw repeats the previous nonce.
    Jump {
        scale: u64,
        current: Option<u64>,
        rng: ThreadRng,
    },
    /// `id, id + step, id + 2 * step, ...`
    Stride { next: u64, step: u64 },
}

impl NonceWalk {
    fn new(strategy: NonceStrategy, id: usize, workers: usize) -> Self {
        match strategy {
            NonceStrategy::Jump if id == 0 => NonceWalk::Sequential { next: 0 },
            NonceStrategy::Jump => NonceWalk::Jump {
                scale: id as u64,
                current: None,
                rng: rand::thread_rng(),
            },
            NonceStrategy::Stride => NonceWalk::Stride {
                next: id as u64,
                step: workers.max(1) as u64,
            },
        }
    }

    fn advance(&mut self) -> u64 {
        match self {
            NonceWalk::Sequential { next } => {
                let nonce = *next;
                *next = next.wrapping_add(1);
                nonce
            }
            NonceWalk::Jump { scale, current, rng } => {
                let jump = u64::from(rng.gen::<u32>()).wrapping_mul(*scale);
                let nonce = current.map_or(jump, |c| c.wrapping_add(jump));
                *current = Some(nonce);
                nonce
            }
            NonceWalk::Stride { next, step } => {
                let nonce = *next;
                *next = next.wrapping_add(*step);
                nonce
            }
        }
    }
}

//! Work partitioning and the short-lived worker pool behind every parallel pass.
//!
//! A sequence of length `L` is split across `W` workers. Each worker owns a
//! contiguous block of `L / W` indices, and the first `L % W` workers each take
//! one extra index from the tail of the sequence. Partitions are a pure
//! function of `(L, W, w)`, so every worker computes its own without any
//! shared state.

use std::any::Any;
use std::ops::Range;
use std::thread;
use tracing::{debug, error};

/// The indices of a sequence owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Contiguous block of `len / workers` indices
    block: Range<usize>,
    /// Single tail index handed out while the remainder lasts
    extra: Option<usize>,
}

impl Partition {
    /// Compute the partition of worker `id` for a sequence of `len` items
    /// split across `workers` workers.
    ///
    /// # Parameters
    ///
    /// - `len`: Length of the sequence being split.
    /// - `workers`: Total number of workers. Zero yields an empty partition.
    /// - `id`: The worker id, in `0..workers`.
    ///
    /// # Returns
    ///
    /// A partition whose indices are disjoint from every other worker's, and
    /// whose union over all ids is exactly `0..len`.
    pub fn of(len: usize, workers: usize, id: usize) -> Self {
        if workers == 0 || id >= workers {
            return Self::empty();
        }

        let interval = len / workers;
        let remainder = len % workers;

        if interval > 0 {
            // `workers * interval == len - remainder`, so the tail indices
            // never fall inside any block.
            let start = id * interval;
            Self {
                block: start..start + interval,
                extra: (id < remainder).then(|| len - (id + 1)),
            }
        } else {
            // More workers than items: the first `len` workers take one each.
            Self {
                block: 0..0,
                extra: (id < remainder).then_some(id),
            }
        }
    }

    fn empty() -> Self {
        Self {
            block: 0..0,
            extra: None,
        }
    }

    /// Owned indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.block.clone().chain(self.extra)
    }

    /// Borrow the owned items of `items`, preserving sequence order.
    ///
    /// The iterator borrows only `items`, so the partition itself may be
    /// dropped while the selected items are still in use.
    pub fn select<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        self.block.clone().chain(self.extra).filter_map(move |i| items.get(i))
    }

    pub fn len(&self) -> usize {
        self.block.len() + usize::from(self.extra.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A worker that panicked or could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub id: usize,
    pub reason: String,
}

/// What a pool run produced once every worker has been joined.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    /// `(worker id, value)` for every worker that ran to completion, in id order
    pub results: Vec<(usize, T)>,
    /// Workers whose task did not complete
    pub failures: Vec<WorkerFailure>,
}

impl<T> PoolOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.id).collect()
    }
}

/// Run `task` on `workers` OS threads, each handed its own id, and block
/// until all of them have finished.
///
/// Threads are scoped to this call, so tasks may borrow from the caller and
/// none can outlive it. A panicking worker is logged and reported in
/// [`PoolOutcome::failures`]; its siblings keep running.
pub fn run<T, F>(workers: usize, task: F) -> PoolOutcome<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let task = &task;
    let mut results = Vec::with_capacity(workers);
    let mut failures = Vec::new();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn_scoped(scope, move || task(id));

            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    error!(target: "ledger::workers", worker = id, error = %e, "Worker could not be started");
                    failures.push(WorkerFailure {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Barrier: every started worker is joined before the scope closes.
        for (id, handle) in handles {
            match handle.join() {
                Ok(value) => results.push((id, value)),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(target: "ledger::workers", worker = id, reason = %reason, "Worker panicked");
                    failures.push(WorkerFailure { id, reason });
                }
            }
        }
    });

    debug!(
        target: "ledger::workers",
        workers,
        completed = results.len(),
        failed = failures.len(),
        "Worker pool joined"
    );

    failures.sort_by_key(|f| f.id);
    PoolOutcome { results, failures }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

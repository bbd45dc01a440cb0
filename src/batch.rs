//! Worker-pool fan-out for batch hashing.
//!
//! Jobs are spawned onto a fixed-size rayon pool and every job sends its
//! [`BatchResult`] down a crossbeam channel the moment it finishes, so the
//! caller sees results in completion order, not submission order. Each result
//! still carries its input `index`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::error::Result;

/// Outcome of hashing one input of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Position of the input in the submitted batch.
    pub index: usize,
    pub source: String,
    pub success: bool,
    pub hash_value: Option<u64>,
    pub hash_hex: Option<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn hashed(index: usize, source: String, hash_value: u64, hash_hex: String, elapsed: Duration) -> Self {
        Self {
            index,
            source,
            success: true,
            hash_value: Some(hash_value),
            hash_hex: Some(hash_hex),
            error: None,
            elapsed,
        }
    }

    pub fn failed(index: usize, source: String, error: String, elapsed: Duration) -> Self {
        Self {
            index,
            source,
            success: false,
            hash_value: None,
            hash_hex: None,
            error: Some(error),
            elapsed,
        }
    }

    pub fn processing_time_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// `workers == 0` lets rayon pick one thread per CPU.
pub fn build_pool(workers: usize) -> Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("hash-worker-{}", i))
        .build()?;
    Ok(Arc::new(pool))
}

/// Lazily yields batch results as workers finish them.
///
/// Single pass; once drained it stays empty. Dropping it early does not
/// cancel jobs already queued on the pool.
pub struct BatchIter {
    rx: Receiver<BatchResult>,
    remaining: usize,
    total: usize,
    _pool: Arc<ThreadPool>,
}

impl BatchIter {
    pub fn total(&self) -> usize {
        self.total
    }

    /// Drains the iterator, reporting `(done, total)` after every
    /// `chunk_size` completions and once more at the end.
    pub fn collect_with_progress(
        self,
        chunk_size: usize,
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Vec<BatchResult> {
        let total = self.total;
        let chunk_size = chunk_size.max(1);
        let mut results = Vec::with_capacity(total);

        for result in self {
            results.push(result);
            let done = results.len();
            if done % chunk_size == 0
                && let Some(cb) = on_progress.as_mut()
            {
                cb(done, total);
            }
        }

        if let Some(cb) = on_progress.as_mut() {
            cb(results.len(), total);
        }
        results
    }
}

impl Iterator for BatchIter {
    type Item = BatchResult;

    fn next(&mut self) -> Option<BatchResult> {
        if self.remaining == 0 {
            return None;
        }
        match self.rx.recv() {
            Ok(result) => {
                self.remaining -= 1;
                Some(result)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BatchIter {}

/// Spawns one job per item. A panicking job becomes a failed result instead
/// of taking the batch down.
pub(crate) fn spawn_batch<T, F>(pool: Arc<ThreadPool>, items: Vec<(String, T)>, job: F) -> BatchIter
where
    T: Send + 'static,
    F: Fn(usize, String, T) -> BatchResult + Send + Sync + 'static,
{
    let (tx, rx) = unbounded();
    let job = Arc::new(job);
    let total = items.len();

    for (index, (source, item)) in items.into_iter().enumerate() {
        let tx = tx.clone();
        let job = Arc::clone(&job);
        pool.spawn(move || {
            let start = std::time::Instant::now();
            let id = source.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| job(index, source, item)))
                .unwrap_or_else(|_| {
                    BatchResult::failed(index, id, "worker panicked".to_string(), start.elapsed())
                });
            let _ = tx.send(result);
        });
    }
    drop(tx);

    BatchIter { rx, remaining: total, total, _pool: pool }
}

//! Nonce search workers.
//!
//! Each worker owns a fixed slice of the 32-bit nonce space and hashes
//! windows of it against whatever task its slot currently holds.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use solo_core::{double_sha256, hash_below_target, BLOCK_HEADER_SIZE, HEADER_PRENONCE_SIZE};
use tracing::{debug, error, info};

use crate::shutdown::ShutdownSignal;
use crate::slots::{FoundNonce, ResultSlot, StatsArray, Task, TaskSlot};

/// Size of the full nonce space.
pub const NONCE_SPACE: u64 = 1 << 32;

/// A half-open nonce interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    pub start: u64,
    pub end: u64,
}

impl NonceRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick a window of `chunk_size` nonces at a random offset inside the
    /// range, or the whole range when it is not larger than one chunk.
    pub fn search_window<R: Rng + ?Sized>(&self, chunk_size: u64, rng: &mut R) -> NonceRange {
        if self.len() <= chunk_size {
            return *self;
        }
        let start = rng.gen_range(self.start..=self.end - chunk_size);
        NonceRange {
            start,
            end: start + chunk_size,
        }
    }
}

/// Split the nonce space into `workers` contiguous ranges.
///
/// Every range is `2^32 / workers` wide; the last one is stretched to
/// the top of the space so the union covers it exactly.
pub fn nonce_ranges(workers: usize) -> Vec<NonceRange> {
    if workers == 0 {
        return Vec::new();
    }
    let count = workers as u64;
    let width = NONCE_SPACE / count;

    (0..count)
        .map(|i| {
            let start = i * width;
            let end = if i + 1 == count {
                NONCE_SPACE
            } else {
                ((i + 1) * width).min(NONCE_SPACE)
            };
            NonceRange { start, end }
        })
        .collect()
}

/// Outcome of hashing one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    /// The first nonce whose hash met the target.
    pub nonce: Option<u32>,
    /// Hashes computed, including the winning one.
    pub hashes: u64,
}

/// Hash every nonce in `window` against `target_le`, stopping at the
/// first hit.
pub fn scan(
    header: &[u8; HEADER_PRENONCE_SIZE],
    target_le: &[u8; 32],
    window: NonceRange,
) -> ScanResult {
    let mut full = [0u8; BLOCK_HEADER_SIZE];
    full[..HEADER_PRENONCE_SIZE].copy_from_slice(header);

    let end = window.end.min(NONCE_SPACE);
    let mut hashes = 0u64;

    for nonce in window.start..end {
        let nonce = nonce as u32;
        full[HEADER_PRENONCE_SIZE..].copy_from_slice(&nonce.to_le_bytes());
        hashes += 1;

        if hash_below_target(&double_sha256(&full), target_le) {
            return ScanResult {
                nonce: Some(nonce),
                hashes,
            };
        }
    }

    ScanResult {
        nonce: None,
        hashes,
    }
}

/// Settings shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Nonces per search window.
    pub chunk_size: u64,
    /// Sleep while the task slot is empty.
    pub idle_backoff: Duration,
}

/// A single search thread's state.
pub struct Worker {
    id: usize,
    range: NonceRange,
    settings: WorkerSettings,
    slot: Arc<TaskSlot>,
    results: Arc<ResultSlot>,
    stats: Arc<StatsArray>,
    shutdown: ShutdownSignal,
}

impl Worker {
    pub fn new(
        id: usize,
        range: NonceRange,
        settings: WorkerSettings,
        slot: Arc<TaskSlot>,
        results: Arc<ResultSlot>,
        stats: Arc<StatsArray>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Worker {
            id,
            range,
            settings,
            slot,
            results,
            stats,
            shutdown,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn range(&self) -> NonceRange {
        self.range
    }

    /// Poll the task slot and search until shutdown.
    ///
    /// A panic inside a search window is logged and the loop continues.
    pub fn run(self) {
        info!(
            worker = self.id,
            start = self.range.start,
            end = self.range.end,
            "worker started"
        );
        let mut rng = rand::thread_rng();

        while !self.shutdown.is_triggered() {
            let Some(task) = self.slot.read() else {
                self.shutdown.sleep(self.settings.idle_backoff);
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.search(&task, &mut rng)));
            if let Err(cause) = outcome {
                error!(
                    worker = self.id,
                    task_id = task.id,
                    cause = %panic_message(&*cause),
                    "search window failed"
                );
            }
        }

        debug!(worker = self.id, "worker stopped");
    }

    /// Search one window of `task` and account for the hashes done.
    pub fn search<R: Rng + ?Sized>(&self, task: &Task, rng: &mut R) -> ScanResult {
        let window = self.range.search_window(self.settings.chunk_size, rng);
        let result = scan(&task.header, &task.target, window);

        if let Some(nonce) = result.nonce {
            let found = FoundNonce {
                task_id: task.id,
                nonce,
            };
            if self.results.try_publish(found) {
                info!(worker = self.id, task_id = task.id, nonce, "found nonce below target");
            } else {
                debug!(
                    worker = self.id,
                    task_id = task.id,
                    nonce,
                    "result slot busy, dropping nonce"
                );
            }
        }

        self.stats.add(self.id, result.hashes);
        result
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = cause.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = cause.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

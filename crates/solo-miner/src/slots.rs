//! Fixed-layout regions shared between the orchestrator, the workers and
//! the result checker.
//!
//! Layouts (little-endian):
//! - task slot: `task_id(8) | header(76) | target(32)` = 116 bytes
//! - result slot: `task_id(8) | nonce(4)` = 12 bytes
//!
//! A task id of 0 marks an empty region.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use solo_core::HEADER_PRENONCE_SIZE;

/// Layout revision of the encoded regions below.
pub const SLOT_LAYOUT_VERSION: u8 = 1;

/// Task id meaning "nothing published".
pub const NO_TASK: u64 = 0;

const ID_SIZE: usize = 8;
const TARGET_SIZE: usize = 32;
const HEADER_OFFSET: usize = ID_SIZE;
const TARGET_OFFSET: usize = HEADER_OFFSET + HEADER_PRENONCE_SIZE;

/// Encoded size of a task slot.
pub const TASK_SLOT_SIZE: usize = TARGET_OFFSET + TARGET_SIZE;

/// Encoded size of the result slot.
pub const RESULT_SLOT_SIZE: usize = ID_SIZE + 4;

/// One unit of work broadcast to every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub header: [u8; HEADER_PRENONCE_SIZE],
    /// Target as a little-endian 256-bit integer.
    pub target: [u8; 32],
}

impl Task {
    /// Build a task from a big-endian target as produced by
    /// [`solo_core::bits_to_target`].
    pub fn new(id: u64, header: [u8; HEADER_PRENONCE_SIZE], target_be: [u8; 32]) -> Self {
        let mut target = target_be;
        target.reverse();
        Task { id, header, target }
    }

    pub fn encode(&self) -> [u8; TASK_SLOT_SIZE] {
        let mut bytes = [0u8; TASK_SLOT_SIZE];
        bytes[..HEADER_OFFSET].copy_from_slice(&self.id.to_le_bytes());
        bytes[HEADER_OFFSET..TARGET_OFFSET].copy_from_slice(&self.header);
        bytes[TARGET_OFFSET..].copy_from_slice(&self.target);
        bytes
    }

    /// Decode a task slot; `None` when the slot is empty.
    pub fn decode(bytes: &[u8; TASK_SLOT_SIZE]) -> Option<Self> {
        let id = read_id(bytes);
        if id == NO_TASK {
            return None;
        }

        let mut header = [0u8; HEADER_PRENONCE_SIZE];
        header.copy_from_slice(&bytes[HEADER_OFFSET..TARGET_OFFSET]);
        let mut target = [0u8; 32];
        target.copy_from_slice(&bytes[TARGET_OFFSET..]);

        Some(Task { id, header, target })
    }
}

fn read_id(bytes: &[u8]) -> u64 {
    let mut id = [0u8; ID_SIZE];
    id.copy_from_slice(&bytes[..ID_SIZE]);
    u64::from_le_bytes(id)
}

/// A worker's current assignment.
///
/// Written by the orchestrator, read by the owning worker. The whole
/// region is replaced under the lock so a reader never sees a torn task.
#[derive(Debug)]
pub struct TaskSlot {
    region: Mutex<[u8; TASK_SLOT_SIZE]>,
}

impl Default for TaskSlot {
    fn default() -> Self {
        TaskSlot {
            region: Mutex::new([0u8; TASK_SLOT_SIZE]),
        }
    }
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, task: &Task) {
        let encoded = task.encode();
        *self.region.lock() = encoded;
    }

    /// Copy out the current task, if any.
    pub fn read(&self) -> Option<Task> {
        let snapshot = *self.region.lock();
        Task::decode(&snapshot)
    }

    /// Id of the current task, `NO_TASK` when empty.
    pub fn task_id(&self) -> u64 {
        read_id(&self.region.lock()[..])
    }
}

/// A winning nonce reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundNonce {
    pub task_id: u64,
    pub nonce: u32,
}

/// The single shared result slot.
///
/// Any worker may publish into an empty slot; only the result checker
/// clears it.
#[derive(Debug)]
pub struct ResultSlot {
    region: Mutex<[u8; RESULT_SLOT_SIZE]>,
}

impl Default for ResultSlot {
    fn default() -> Self {
        ResultSlot {
            region: Mutex::new([0u8; RESULT_SLOT_SIZE]),
        }
    }
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a result if the slot is empty.
    ///
    /// Returns `false` if another result is still waiting to be consumed.
    pub fn try_publish(&self, found: FoundNonce) -> bool {
        let mut region = self.region.lock();
        if read_id(&region[..]) != NO_TASK {
            return false;
        }
        region[..ID_SIZE].copy_from_slice(&found.task_id.to_le_bytes());
        region[ID_SIZE..].copy_from_slice(&found.nonce.to_le_bytes());
        true
    }

    /// Read the waiting result without consuming it.
    pub fn peek(&self) -> Option<FoundNonce> {
        let region = self.region.lock();
        let task_id = read_id(&region[..]);
        if task_id == NO_TASK {
            return None;
        }
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(&region[ID_SIZE..]);
        Some(FoundNonce {
            task_id,
            nonce: u32::from_le_bytes(nonce),
        })
    }

    pub fn clear(&self) {
        *self.region.lock() = [0u8; RESULT_SLOT_SIZE];
    }
}

/// Per-worker hash counters.
///
/// Each counter has exactly one writer and only ever grows, so readers
/// take relaxed snapshots without locking.
#[derive(Debug)]
pub struct StatsArray {
    counters: Box<[AtomicU64]>,
}

impl StatsArray {
    pub fn new(workers: usize) -> Self {
        StatsArray {
            counters: (0..workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Add `hashes` to the counter for `worker`.
    pub fn add(&self, worker: usize, hashes: u64) {
        if let Some(counter) = self.counters.get(worker) {
            counter.fetch_add(hashes, Ordering::Relaxed);
        }
    }

    pub fn get(&self, worker: usize) -> u64 {
        self.counters
            .get(worker)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.snapshot().iter().sum()
    }
}

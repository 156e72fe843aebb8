//! Published templates, keyed by task id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use solo_core::BlockTemplate;

/// How many heights below the newest one stay resolvable.
pub const RETAINED_DEPTH: u64 = 1;

/// The template a task was built from, and its height.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub template: Arc<BlockTemplate>,
    pub height: u64,
}

/// Task id to template map shared by the orchestrator and the result
/// checker.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<u64, CachedEntry>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task_id: u64, template: Arc<BlockTemplate>) {
        let height = template.height;
        self.entries
            .lock()
            .insert(task_id, CachedEntry { template, height });
    }

    /// Independent copy of the entry for `task_id`.
    ///
    /// The lock is released before this returns, so callers can build
    /// and submit without blocking publication.
    pub fn snapshot(&self, task_id: u64) -> Option<CachedEntry> {
        self.entries.lock().get(&task_id).cloned()
    }

    /// Drop every entry more than [`RETAINED_DEPTH`] below `new_height`,
    /// i.e. at `new_height - 2` or lower. Returns the number removed.
    pub fn evict(&self, new_height: u64) -> usize {
        let threshold = new_height.saturating_sub(RETAINED_DEPTH);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.height >= threshold);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solo_core::CompactBits;

    fn template(height: u64) -> Arc<BlockTemplate> {
        Arc::new(BlockTemplate {
            version: 0x20000000,
            prev_block_hash: [height as u8; 32],
            bits: CompactBits::Value(0x207fffff),
            curtime: Some(1_700_000_000),
            mediantime: Some(1_700_000_000),
            height,
            coinbase_value: 5_000_000_000,
            witness_commitment: None,
            transactions: Vec::new(),
        })
    }

    #[test]
    fn test_snapshot_returns_inserted_template() {
        let cache = TemplateCache::new();
        assert!(cache.snapshot(1).is_none());

        cache.insert(1, template(100));
        let entry = cache.snapshot(1).unwrap();
        assert_eq!(entry.height, 100);
        assert_eq!(entry.template.prev_block_hash, [100u8; 32]);
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let cache = TemplateCache::new();
        cache.insert(1, template(100));
        let entry = cache.snapshot(1).unwrap();

        cache.insert(1, template(101));
        cache.evict(200);

        assert_eq!(entry.height, 100);
        assert!(cache.snapshot(1).is_none());
    }

    #[test]
    fn test_evict_keeps_previous_height() {
        let cache = TemplateCache::new();
        cache.insert(1, template(97));
        cache.insert(2, template(98));
        cache.insert(3, template(99));
        cache.insert(4, template(99));
        cache.insert(5, template(100));

        let removed = cache.evict(100);

        assert_eq!(removed, 2);
        assert!(cache.snapshot(1).is_none());
        assert!(cache.snapshot(2).is_none());
        assert!(cache.snapshot(3).is_some());
        assert!(cache.snapshot(4).is_some());
        assert!(cache.snapshot(5).is_some());
        assert_eq!(cache.len(), 3);

        // One more block: height 99 is now too old.
        cache.insert(6, template(101));
        assert_eq!(cache.evict(101), 2);
        assert!(cache.snapshot(4).is_none());
        assert!(cache.snapshot(5).is_some());
        assert!(cache.snapshot(6).is_some());
    }

    #[test]
    fn test_evict_low_heights() {
        let cache = TemplateCache::new();
        cache.insert(1, template(0));
        cache.insert(2, template(1));
        assert_eq!(cache.evict(1), 0);
        assert_eq!(cache.evict(0), 0);
        assert!(!cache.is_empty());
    }
}

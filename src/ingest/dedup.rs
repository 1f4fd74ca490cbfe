//! Bounded recency window of delivered event ids.
//!
//! Paginated polling can observe the same event twice (a retried page, an
//! overlapping cursor). Duplicates cluster near the page boundary, so only
//! the most recent ids are remembered.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Fixed-capacity, insertion-ordered set of event ids.
///
/// Lookups never promote an entry, so eviction follows insertion order.
#[derive(Debug)]
pub struct DedupWindow {
    ids: LruCache<String, ()>,
}

impl DedupWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ids: LruCache::new(capacity),
        }
    }

    /// Whether `id` is currently remembered.
    pub fn seen(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Remember `id`, evicting the oldest entry once full.
    pub fn record(&mut self, id: &str) {
        if self.ids.contains(id) {
            return;
        }
        self.ids.push(id.to_string(), ());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ids.cap().get()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

//! Size-bounded cache of rendered pages
//!
//! Entries are evicted least-recently-used first once the byte budget is
//! exceeded. Pages handed out to callers are shared through `Arc` and stay
//! pinned (never evicted) while any caller still holds them.
//!
//! # Thread Safety
//!
//! All state sits behind one `parking_lot::Mutex`. Renders run outside the
//! lock; a key being rendered is marked pending so other callers wait on a
//! condition variable instead of rendering it again.

mod key;

pub use key::PageKey;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::document::{DocumentId, RenderedPage};

/// Default byte budget: 128 MiB
pub const CACHE_CAPACITY_BYTES: usize = 128 << 20;

/// Result of inserting a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Not cached: the page alone exceeds the budget, or the budget is held
    /// by pages still in use. Callers keep using their copy.
    Rejected,
}

/// Counters for cache behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rejected: u64,
    pub entries: usize,
    pub used_bytes: usize,
}

struct CacheEntry {
    resource: Arc<RenderedPage>,
    size_bytes: usize,
    last_access: u64,
}

impl CacheEntry {
    /// Someone besides the cache holds the page
    fn is_checked_out(&self) -> bool {
        Arc::strong_count(&self.resource) > 1
    }
}

enum Slot {
    Ready(CacheEntry),
    /// A render for this key is in flight
    Pending,
}

#[derive(Default)]
struct CacheState {
    slots: FxHashMap<PageKey, Slot>,
    /// last_access -> key, oldest first
    recency: BTreeMap<u64, PageKey>,
    used_bytes: usize,
    clock: u64,
    stats: CacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Cache-hit promotion
    fn touch(&mut self, key: &PageKey) -> Option<Arc<RenderedPage>> {
        let now = self.tick();
        let Some(Slot::Ready(entry)) = self.slots.get_mut(key) else {
            return None;
        };
        self.recency.remove(&entry.last_access);
        entry.last_access = now;
        self.recency.insert(now, *key);
        Some(Arc::clone(&entry.resource))
    }

    fn remove_ready(&mut self, key: &PageKey) -> Option<CacheEntry> {
        if !matches!(self.slots.get(key), Some(Slot::Ready(_))) {
            return None;
        }
        match self.slots.remove(key) {
            Some(Slot::Ready(entry)) => {
                self.recency.remove(&entry.last_access);
                self.used_bytes -= entry.size_bytes;
                Some(entry)
            }
            _ => None,
        }
    }

    fn insert(
        &mut self,
        key: PageKey,
        resource: Arc<RenderedPage>,
        size_bytes: usize,
        capacity: usize,
    ) -> PutOutcome {
        if size_bytes > capacity {
            self.stats.rejected += 1;
            tracing::warn!(
                doc_id = %key.document,
                page = key.page_index,
                bytes = size_bytes,
                capacity,
                "Page larger than cache capacity, not cached"
            );
            return PutOutcome::Rejected;
        }

        // Bytes of the entry being replaced count as free; it is only
        // dropped once the new page is known to fit
        let replaced_bytes = match self.slots.get(&key) {
            Some(Slot::Ready(entry)) => entry.size_bytes,
            _ => 0,
        };

        // Choose victims oldest first, skipping pages still in use
        let mut victims: SmallVec<[PageKey; 8]> = SmallVec::new();
        let mut freed = 0;
        let needed = (self.used_bytes - replaced_bytes + size_bytes).saturating_sub(capacity);
        if needed > 0 {
            for candidate in self.recency.values() {
                if freed >= needed {
                    break;
                }
                if *candidate == key {
                    continue;
                }
                if let Some(Slot::Ready(entry)) = self.slots.get(candidate) {
                    if !entry.is_checked_out() {
                        freed += entry.size_bytes;
                        victims.push(*candidate);
                    }
                }
            }
        }

        if freed < needed {
            self.stats.rejected += 1;
            tracing::warn!(
                doc_id = %key.document,
                page = key.page_index,
                bytes = size_bytes,
                "Cache budget held by pages in use, not cached"
            );
            return PutOutcome::Rejected;
        }

        self.remove_ready(&key);
        for victim in &victims {
            if self.remove_ready(victim).is_some() {
                self.stats.evictions += 1;
                tracing::debug!(
                    doc_id = %victim.document,
                    page = victim.page_index,
                    "Evicted cached page"
                );
            }
        }

        let now = self.tick();
        self.recency.insert(now, key);
        self.used_bytes += size_bytes;
        self.slots.insert(
            key,
            Slot::Ready(CacheEntry {
                resource,
                size_bytes,
                last_access: now,
            }),
        );
        PutOutcome::Stored
    }
}

/// Thread-safe LRU cache of rendered pages bounded by total bytes
pub struct ResourceCache {
    capacity: usize,
    state: Mutex<CacheState>,
    rendered: Condvar,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY_BYTES)
    }
}

impl ResourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
            rendered: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a page, promoting it on hit
    pub fn get(&self, key: &PageKey) -> Option<Arc<RenderedPage>> {
        let mut state = self.state.lock();
        match state.touch(key) {
            Some(page) => {
                state.stats.hits += 1;
                Some(page)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a page. A page that cannot fit is rejected, not an error.
    pub fn put(&self, key: PageKey, resource: Arc<RenderedPage>, size_bytes: usize) -> PutOutcome {
        let outcome = self
            .state
            .lock()
            .insert(key, resource, size_bytes, self.capacity);
        // Wake callers that were waiting on a render of this key
        self.rendered.notify_all();
        outcome
    }

    /// Return the cached page or render it, with at most one render per key
    /// in flight. Callers arriving during a render wait for its result.
    pub fn get_or_render<F, E>(&self, key: PageKey, render: F) -> Result<Arc<RenderedPage>, E>
    where
        F: FnOnce() -> Result<RenderedPage, E>,
    {
        let mut state = self.state.lock();
        loop {
            let pending = match state.slots.get(&key) {
                Some(Slot::Ready(_)) => false,
                Some(Slot::Pending) => true,
                None => break,
            };
            if pending {
                self.rendered.wait(&mut state);
                continue;
            }
            if let Some(page) = state.touch(&key) {
                state.stats.hits += 1;
                tracing::debug!(doc_id = %key.document, page = key.page_index, "Page cache hit");
                return Ok(page);
            }
        }

        state.stats.misses += 1;
        state.slots.insert(key, Slot::Pending);
        drop(state);

        tracing::debug!(doc_id = %key.document, page = key.page_index, "Page cache miss, rendering");

        let guard = PendingGuard { cache: self, key };
        let page = Arc::new(render()?);
        let size_bytes = page.size_bytes();
        guard.complete(Arc::clone(&page), size_bytes);
        Ok(page)
    }

    /// Drop unpinned pages of one document
    pub fn purge_document(&self, document: DocumentId) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<PageKey> = state
            .slots
            .iter()
            .filter(|(key, slot)| {
                key.document == document
                    && matches!(slot, Slot::Ready(entry) if !entry.is_checked_out())
            })
            .map(|(key, _)| *key)
            .collect();

        for key in &keys {
            state.remove_ready(key);
        }
        keys.len()
    }

    /// Drop every unpinned page
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let keys: Vec<PageKey> = state
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(entry) if !entry.is_checked_out()))
            .map(|(key, _)| *key)
            .collect();
        for key in &keys {
            state.remove_ready(key);
        }
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        matches!(self.state.lock().slots.get(key), Some(Slot::Ready(_)))
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().used_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state
                .slots
                .values()
                .filter(|s| matches!(s, Slot::Ready(_)))
                .count(),
            used_bytes: state.used_bytes,
            ..state.stats
        }
    }
}

/// Clears a pending marker even if the render fails or panics
struct PendingGuard<'a> {
    cache: &'a ResourceCache,
    key: PageKey,
}

impl PendingGuard<'_> {
    fn complete(self, page: Arc<RenderedPage>, size_bytes: usize) {
        {
            let mut state = self.cache.state.lock();
            if matches!(state.slots.get(&self.key), Some(Slot::Pending)) {
                state.slots.remove(&self.key);
            }
            state.insert(self.key, page, size_bytes, self.cache.capacity);
        }
        self.cache.rendered.notify_all();
        std::mem::forget(self);
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.cache.state.lock();
            if matches!(state.slots.get(&self.key), Some(Slot::Pending)) {
                state.slots.remove(&self.key);
            }
        }
        self.cache.rendered.notify_all();
    }
}

//! Small LRU cache for header and bitmap pages. Recommended capacity is 16
//! entries; on eviction a dirty page is handed back so the caller can write
//! it through before it's dropped.

pub struct CachedPage {
    pub bytes: Vec<u8>,
    pub dirty: bool,
}

pub struct HeaderCache {
    capacity: usize,
    /// Front = most recently used.
    entries: Vec<(u64, CachedPage)>,
}

impl HeaderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, page_num: u64) -> Option<usize> {
        self.entries.iter().position(|(p, _)| *p == page_num)
    }

    fn touch(&mut self, idx: usize) {
        let entry = self.entries.remove(idx);
        self.entries.insert(0, entry);
    }

    pub fn get(&mut self, page_num: u64) -> Option<&mut CachedPage> {
        let idx = self.position(page_num)?;
        self.touch(idx);
        Some(&mut self.entries[0].1)
    }

    /// Inserts a freshly loaded page, evicting the LRU entry if the cache
    /// is at capacity. Returns the evicted entry when it was dirty.
    pub fn insert(&mut self, page_num: u64, bytes: Vec<u8>) -> Option<(u64, Vec<u8>)> {
        if let Some(idx) = self.position(page_num) {
            self.entries.remove(idx);
        }
        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            let (evicted_num, evicted_page) = self.entries.pop().unwrap();
            if evicted_page.dirty {
                evicted = Some((evicted_num, evicted_page.bytes));
            }
        }
        self.entries.insert(
            0,
            (
                page_num,
                CachedPage {
                    bytes,
                    dirty: false,
                },
            ),
        );
        evicted
    }

    pub fn mark_dirty(&mut self, page_num: u64) {
        if let Some(idx) = self.position(page_num) {
            self.entries[idx].1.dirty = true;
        }
    }

    /// Removes every dirty entry, returning `(page_num, bytes)` pairs for
    /// the caller to write back, and clears their dirty flags in place.
    pub fn drain_dirty(&mut self) -> Vec<(u64, Vec<u8>)> {
        self.entries
            .iter_mut()
            .filter(|(_, page)| page.dirty)
            .map(|(num, page)| {
                page.dirty = false;
                (*num, page.bytes.clone())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Buffer pool manager: pins/unpins pages into a fixed set of frames,
//! delegating victim selection to a pluggable [`policy::ReplacementPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use buffer::{BufferManager, UnpinMode};
//! use common::ReplacementPolicyKind;
//! use storage::DiskManager;
//! use std::path::Path;
//!
//! let disk = DiskManager::create(Path::new("/tmp/example.db"), 1000, 1024).unwrap();
//! let mut pool = BufferManager::new(disk, 16, ReplacementPolicyKind::Lru);
//!
//! let (page_id, frame) = pool.new_page().unwrap();
//! pool.page_data_mut(frame)[0] = 42;
//! pool.unpin_page(page_id, UnpinMode::Dirty).unwrap();
//! ```

mod policy;

pub use policy::{ClockPolicy, FrameState, LruPolicy, MruPolicy, RandomPolicy, ReplacementPolicy};

use common::{DbError, DbResult, PageId, ReplacementPolicyKind};
use hashbrown::HashMap;
use storage::DiskManager;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnpinMode {
    Clean,
    Dirty,
}

struct Frame {
    page_id: Option<PageId>,
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
}

/// Buffer pool over a [`DiskManager`]. Owns the page table, free-frame
/// list, and the active replacement policy; invariants enforced here: a
/// page is resident with pin count >= 1 immediately after `pin_page`, at
/// most one frame is ever associated with a given page ID, and a frame
/// handed to the policy as a victim always has pin count 0.
pub struct BufferManager {
    disk: DiskManager,
    page_size: usize,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, usize>,
    free_list: Vec<usize>,
    policy: Box<dyn ReplacementPolicy>,
}

fn make_policy(kind: ReplacementPolicyKind, num_frames: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        ReplacementPolicyKind::Random => Box::new(RandomPolicy::default()),
        ReplacementPolicyKind::Lru => Box::new(LruPolicy::default()),
        ReplacementPolicyKind::Mru => Box::new(MruPolicy::default()),
        ReplacementPolicyKind::Clock => Box::new(ClockPolicy::new(num_frames)),
    }
}

impl BufferManager {
    pub fn new(disk: DiskManager, num_frames: usize, policy_kind: ReplacementPolicyKind) -> Self {
        let page_size = disk.page_size();
        let frames = (0..num_frames)
            .map(|_| Frame {
                page_id: None,
                data: vec![0u8; page_size],
                pin_count: 0,
                dirty: false,
            })
            .collect();
        Self {
            disk,
            page_size,
            frames,
            page_table: HashMap::new(),
            free_list: (0..num_frames).rev().collect(),
            policy: make_policy(policy_kind, num_frames),
        }
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    pub fn disk_mut(&mut self) -> &mut DiskManager {
        &mut self.disk
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn claim_frame(&mut self) -> DbResult<usize> {
        if let Some(frame_idx) = self.free_list.pop() {
            return Ok(frame_idx);
        }
        let victim = self
            .policy
            .pick_victim()
            .ok_or_else(|| DbError::Capacity("buffer pool has no unpinned frame".into()))?;
        let frame = &self.frames[victim];
        if frame.pin_count != 0 {
            return Err(DbError::Invariant(format!(
                "replacement policy picked frame {victim} with pin count {}",
                frame.pin_count
            )));
        }
        if frame.dirty {
            let page_id = frame
                .page_id
                .ok_or_else(|| DbError::Invariant("dirty frame has no page id".into()))?;
            trace!(frame = victim, page = page_id.0, "evicting dirty frame");
            self.disk.write_page(page_id, &frame.data)?;
        }
        if let Some(page_id) = self.frames[victim].page_id.take() {
            self.page_table.remove(&page_id);
        }
        self.frames[victim].dirty = false;
        debug!(frame = victim, "evicted frame for reuse");
        Ok(victim)
    }

    /// Allocates a disk page, zeroes its frame, pins it once, and marks it
    /// dirty.
    pub fn new_page(&mut self) -> DbResult<(PageId, usize)> {
        let page_id = self.disk.allocate_page()?;
        let frame_idx = match self.claim_frame() {
            Ok(idx) => idx,
            Err(e) => {
                self.disk.deallocate_page(page_id)?;
                return Err(e);
            }
        };
        let frame = &mut self.frames[frame_idx];
        frame.page_id = Some(page_id);
        frame.data.iter_mut().for_each(|b| *b = 0);
        frame.pin_count = 1;
        frame.dirty = true;
        self.page_table.insert(page_id, frame_idx);
        self.policy.state_changed(frame_idx, FrameState::Pinned);
        Ok((page_id, frame_idx))
    }

    /// Drops a page with pin count exactly 1 from the page table and
    /// deallocates its disk page.
    pub fn free_page(&mut self, page_id: PageId) -> DbResult<()> {
        let frame_idx = *self
            .page_table
            .get(&page_id)
            .ok_or_else(|| DbError::InvalidArgument(format!("page {page_id} is not resident")))?;
        let frame = &mut self.frames[frame_idx];
        if frame.pin_count != 1 {
            return Err(DbError::InvalidArgument(format!(
                "freePage requires pin count 1, got {}",
                frame.pin_count
            )));
        }
        frame.pin_count = 0;
        frame.dirty = false;
        frame.page_id = None;
        self.page_table.remove(&page_id);
        self.disk.deallocate_page(page_id)?;
        self.policy.state_changed(frame_idx, FrameState::Free);
        self.free_list.push(frame_idx);
        Ok(())
    }

    /// Pins `page_id`, loading it from disk if it is not already resident.
    pub fn pin_page(&mut self, page_id: PageId) -> DbResult<usize> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidArgument("invalid page id".into()));
        }
        if let Some(&frame_idx) = self.page_table.get(&page_id) {
            let was_unpinned = self.frames[frame_idx].pin_count == 0;
            self.frames[frame_idx].pin_count += 1;
            if was_unpinned {
                self.policy.state_changed(frame_idx, FrameState::Pinned);
            }
            return Ok(frame_idx);
        }
        let frame_idx = self.claim_frame()?;
        let mut buf = vec![0u8; self.page_size];
        self.disk.read_page(page_id, &mut buf)?;
        let frame = &mut self.frames[frame_idx];
        frame.page_id = Some(page_id);
        frame.data = buf;
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.insert(page_id, frame_idx);
        self.policy.state_changed(frame_idx, FrameState::Pinned);
        Ok(frame_idx)
    }

    /// Decrements the pin count of `page_id`, notifying the replacement
    /// policy once it reaches zero.
    pub fn unpin_page(&mut self, page_id: PageId, mode: UnpinMode) -> DbResult<()> {
        let frame_idx = *self
            .page_table
            .get(&page_id)
            .ok_or_else(|| DbError::InvalidArgument(format!("page {page_id} is not resident")))?;
        let frame = &mut self.frames[frame_idx];
        if frame.pin_count == 0 {
            return Err(DbError::InvalidArgument(format!(
                "page {page_id} is not pinned"
            )));
        }
        frame.pin_count -= 1;
        if mode == UnpinMode::Dirty {
            frame.dirty = true;
        }
        if frame.pin_count == 0 {
            self.policy.state_changed(frame_idx, FrameState::Unpinned);
        }
        Ok(())
    }

    pub fn flush_page(&mut self, page_id: PageId) -> DbResult<()> {
        let frame_idx = *self
            .page_table
            .get(&page_id)
            .ok_or_else(|| DbError::InvalidArgument(format!("page {page_id} is not resident")))?;
        let frame = &mut self.frames[frame_idx];
        if frame.dirty {
            self.disk.write_page(page_id, &frame.data)?;
            frame.dirty = false;
        }
        Ok(())
    }

    pub fn flush_all_pages(&mut self) -> DbResult<()> {
        let resident: Vec<PageId> = self.page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        self.disk.flush_all_pages()
    }

    pub fn page_data(&self, frame_idx: usize) -> &[u8] {
        &self.frames[frame_idx].data
    }

    pub fn page_data_mut(&mut self, frame_idx: usize) -> &mut [u8] {
        &mut self.frames[frame_idx].data
    }

    pub fn frame_for(&self, page_id: PageId) -> Option<usize> {
        self.page_table.get(&page_id).copied()
    }

    pub fn pin_count(&self, page_id: PageId) -> u32 {
        self.frame_for(page_id)
            .map(|idx| self.frames[idx].pin_count)
            .unwrap_or(0)
    }

    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.pin_count > 0).count()
    }
}

#[cfg(test)]
mod tests;

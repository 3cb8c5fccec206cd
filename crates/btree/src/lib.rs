//! Persistent B+-tree index, the external collaborator the query executor
//! and optimizer depend on through a narrow contract: create/open an index,
//! insert/remove/search keyed by a [`keycodec::SearchKey`], scan it in key
//! order, and ask how big it is. Node pages are pinned through a
//! [`buffer::BufferManager`] rather than touching the disk file directly, so
//! index traffic shares the same buffer pool and replacement policy as
//! everything else built on top of it.
//!
//! Node splitting is the textbook 50/50 split on overflow; there is no
//! merge-on-underflow path on delete, matching the teaching scope this
//! crate targets rather than a production-grade B+-tree.

mod node;
mod page;

pub use node::{BTreeNode, NodeType};

use buffer::{BufferManager, UnpinMode};
use common::{DbError, DbResult, PageId, RecordId};
use keycodec::SearchKey;
use std::cmp::Ordering;
use tracing::trace;

fn read_node(buffer: &mut BufferManager, page_id: PageId) -> DbResult<BTreeNode> {
    let frame = buffer.pin_page(page_id)?;
    let node = page::decode_node(buffer.page_data(frame));
    buffer.unpin_page(page_id, UnpinMode::Clean)?;
    node
}

fn write_node(buffer: &mut BufferManager, page_id: PageId, node: &BTreeNode) -> DbResult<()> {
    let bytes = page::encode_node(node, buffer.page_size())?;
    let frame = buffer.pin_page(page_id)?;
    buffer.page_data_mut(frame).copy_from_slice(&bytes);
    buffer.unpin_page(page_id, UnpinMode::Dirty)
}

fn allocate_node(buffer: &mut BufferManager, node: &BTreeNode) -> DbResult<PageId> {
    let bytes = page::encode_node(node, buffer.page_size())?;
    let (page_id, frame) = buffer.new_page()?;
    buffer.page_data_mut(frame).copy_from_slice(&bytes);
    buffer.unpin_page(page_id, UnpinMode::Dirty)?;
    Ok(page_id)
}

/// Position of the first key strictly greater than `key`, i.e. the
/// child/slot index `key` belongs before.
fn upper_bound(keys: &[SearchKey], key: &SearchKey) -> DbResult<usize> {
    for (i, k) in keys.iter().enumerate() {
        if key.cmp_key(k)? == Ordering::Less {
            return Ok(i);
        }
    }
    Ok(keys.len())
}

fn upper_bound_entries(entries: &[(SearchKey, RecordId)], key: &SearchKey) -> DbResult<usize> {
    for (i, (k, _)) in entries.iter().enumerate() {
        if key.cmp_key(k)? == Ordering::Less {
            return Ok(i);
        }
    }
    Ok(entries.len())
}

/// A persistent B+-tree index over one data file, addressed by the page ID
/// of its root. The root page ID is the only state a caller needs to
/// persist (typically in the system catalog's index metadata) to reopen the
/// index later.
#[derive(Debug)]
pub struct BTreeIndex {
    root_page_id: PageId,
}

impl BTreeIndex {
    /// Allocates a fresh, empty index (a single empty leaf as its root).
    pub fn create_index(buffer: &mut BufferManager) -> DbResult<Self> {
        let root_page_id = allocate_node(buffer, &BTreeNode::new_leaf())?;
        Ok(Self { root_page_id })
    }

    /// Reopens an index whose root page ID was recorded earlier.
    pub fn open_index(root_page_id: PageId) -> Self {
        Self { root_page_id }
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    fn leftmost_leaf(&self, buffer: &mut BufferManager) -> DbResult<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            match read_node(buffer, page_id)? {
                BTreeNode::Internal { children, .. } => {
                    page_id = *children
                        .first()
                        .ok_or_else(|| DbError::Invariant("internal node has no children".into()))?;
                }
                BTreeNode::Leaf { .. } => return Ok(page_id),
            }
        }
    }

    fn find_leaf(&self, buffer: &mut BufferManager, key: &SearchKey) -> DbResult<PageId> {
        let mut current = self.root_page_id;
        loop {
            match read_node(buffer, current)? {
                BTreeNode::Internal { keys, children } => {
                    let idx = upper_bound(&keys, key)?;
                    current = children[idx];
                }
                BTreeNode::Leaf { .. } => return Ok(current),
            }
        }
    }

    /// Returns the first entry whose key compares equal to `key`, if any.
    pub fn search(&self, buffer: &mut BufferManager, key: &SearchKey) -> DbResult<Option<RecordId>> {
        let leaf_id = self.find_leaf(buffer, key)?;
        match read_node(buffer, leaf_id)? {
            BTreeNode::Leaf { entries, .. } => {
                for (k, rid) in &entries {
                    if k.cmp_key(key)? == Ordering::Equal {
                        return Ok(Some(*rid));
                    }
                }
                Ok(None)
            }
            BTreeNode::Internal { .. } => {
                Err(DbError::Invariant("find_leaf returned an internal node".into()))
            }
        }
    }

    /// Opens an ordered, whole-index scan starting at the leftmost leaf.
    pub fn open_scan(&self, buffer: &mut BufferManager) -> DbResult<IndexScan> {
        let first = self.leftmost_leaf(buffer)?;
        IndexScan::starting_at(buffer, first)
    }

    /// Inserts `(key, rid)`, splitting nodes bottom-up as needed and growing
    /// the tree's height by one if the root itself splits.
    pub fn insert(&mut self, buffer: &mut BufferManager, key: SearchKey, rid: RecordId) -> DbResult<()> {
        if let Some((split_key, new_sibling)) = self.insert_into(buffer, self.root_page_id, key, rid)? {
            let new_root = BTreeNode::Internal {
                keys: vec![split_key],
                children: vec![self.root_page_id, new_sibling],
            };
            self.root_page_id = allocate_node(buffer, &new_root)?;
            trace!(new_root = self.root_page_id.0, "btree grew a level");
        }
        Ok(())
    }

    fn insert_into(
        &mut self,
        buffer: &mut BufferManager,
        page_id: PageId,
        key: SearchKey,
        rid: RecordId,
    ) -> DbResult<Option<(SearchKey, PageId)>> {
        match read_node(buffer, page_id)? {
            BTreeNode::Internal { keys, children } => {
                let idx = upper_bound(&keys, &key)?;
                let child = children[idx];
                let Some((split_key, new_child)) = self.insert_into(buffer, child, key, rid)? else {
                    return Ok(None);
                };
                let mut keys = keys;
                let mut children = children;
                keys.insert(idx, split_key);
                children.insert(idx + 1, new_child);
                self.settle_internal(buffer, page_id, keys, children)
            }
            BTreeNode::Leaf { mut entries, next_leaf } => {
                let idx = upper_bound_entries(&entries, &key)?;
                entries.insert(idx, (key, rid));
                self.settle_leaf(buffer, page_id, entries, next_leaf)
            }
        }
    }

    fn settle_internal(
        &mut self,
        buffer: &mut BufferManager,
        page_id: PageId,
        keys: Vec<SearchKey>,
        children: Vec<PageId>,
    ) -> DbResult<Option<(SearchKey, PageId)>> {
        let candidate = BTreeNode::Internal { keys, children };
        match page::encode_node(&candidate, buffer.page_size()) {
            Ok(_) => {
                write_node(buffer, page_id, &candidate)?;
                Ok(None)
            }
            Err(DbError::Capacity(_)) => {
                let BTreeNode::Internal { keys, children } = candidate else {
                    unreachable!()
                };
                let mid = keys.len() / 2;
                let split_key = keys[mid].clone();
                let left = BTreeNode::Internal {
                    keys: keys[..mid].to_vec(),
                    children: children[..=mid].to_vec(),
                };
                let right = BTreeNode::Internal {
                    keys: keys[mid + 1..].to_vec(),
                    children: children[mid + 1..].to_vec(),
                };
                write_node(buffer, page_id, &left)?;
                let right_id = allocate_node(buffer, &right)?;
                trace!(left = page_id.0, right = right_id.0, "internal node split");
                Ok(Some((split_key, right_id)))
            }
            Err(e) => Err(e),
        }
    }

    fn settle_leaf(
        &mut self,
        buffer: &mut BufferManager,
        page_id: PageId,
        entries: Vec<(SearchKey, RecordId)>,
        next_leaf: PageId,
    ) -> DbResult<Option<(SearchKey, PageId)>> {
        let candidate = BTreeNode::Leaf { entries, next_leaf };
        match page::encode_node(&candidate, buffer.page_size()) {
            Ok(_) => {
                write_node(buffer, page_id, &candidate)?;
                Ok(None)
            }
            Err(DbError::Capacity(_)) => {
                let BTreeNode::Leaf { entries, next_leaf } = candidate else {
                    unreachable!()
                };
                let mid = entries.len() / 2;
                let split_key = entries[mid].0.clone();
                let left_entries = entries[..mid].to_vec();
                let right_entries = entries[mid..].to_vec();
                let right = BTreeNode::Leaf { entries: right_entries, next_leaf };
                let right_id = allocate_node(buffer, &right)?;
                let left = BTreeNode::Leaf { entries: left_entries, next_leaf: right_id };
                write_node(buffer, page_id, &left)?;
                trace!(left = page_id.0, right = right_id.0, "leaf split");
                Ok(Some((split_key, right_id)))
            }
            Err(e) => Err(e),
        }
    }

    /// Removes the first entry whose key compares equal to `key`. Returns
    /// whether an entry was found. Leaves are never merged or rebalanced on
    /// underflow.
    pub fn remove(&mut self, buffer: &mut BufferManager, key: &SearchKey) -> DbResult<bool> {
        let leaf_id = self.find_leaf(buffer, key)?;
        match read_node(buffer, leaf_id)? {
            BTreeNode::Leaf { mut entries, next_leaf } => {
                let mut found = None;
                for (i, (k, _)) in entries.iter().enumerate() {
                    if k.cmp_key(key)? == Ordering::Equal {
                        found = Some(i);
                        break;
                    }
                }
                let Some(idx) = found else { return Ok(false) };
                entries.remove(idx);
                write_node(buffer, leaf_id, &BTreeNode::Leaf { entries, next_leaf })?;
                Ok(true)
            }
            BTreeNode::Internal { .. } => {
                Err(DbError::Invariant("find_leaf returned an internal node".into()))
            }
        }
    }

    /// Total number of entries across all leaves.
    pub fn size(&self, buffer: &mut BufferManager) -> DbResult<u64> {
        let mut page_id = self.leftmost_leaf(buffer)?;
        let mut count = 0u64;
        while page_id.is_valid() {
            match read_node(buffer, page_id)? {
                BTreeNode::Leaf { entries, next_leaf } => {
                    count += entries.len() as u64;
                    page_id = next_leaf;
                }
                BTreeNode::Internal { .. } => {
                    return Err(DbError::Invariant("expected leaf while counting".into()))
                }
            }
        }
        Ok(count)
    }

    /// Verifies structural invariants: strictly ascending keys within every
    /// node, separator keys that correctly bound each subtree, and
    /// `children.len() == keys.len() + 1` for every internal node.
    pub fn check_invariants(&self, buffer: &mut BufferManager) -> DbResult<()> {
        self.check_subtree(buffer, self.root_page_id, None, None)
    }

    fn check_subtree(
        &self,
        buffer: &mut BufferManager,
        page_id: PageId,
        lower: Option<&SearchKey>,
        upper: Option<&SearchKey>,
    ) -> DbResult<()> {
        match read_node(buffer, page_id)? {
            BTreeNode::Leaf { entries, .. } => {
                for w in entries.windows(2) {
                    if w[0].0.cmp_key(&w[1].0)? != Ordering::Less {
                        return Err(DbError::Invariant("leaf entries not strictly ascending".into()));
                    }
                }
                if let (Some((first, _)), Some(lo)) = (entries.first(), lower) {
                    if first.cmp_key(lo)? == Ordering::Less {
                        return Err(DbError::Invariant("leaf key precedes its lower separator bound".into()));
                    }
                }
                if let (Some((last, _)), Some(hi)) = (entries.last(), upper) {
                    if last.cmp_key(hi)? != Ordering::Less {
                        return Err(DbError::Invariant("leaf key at or past its upper separator bound".into()));
                    }
                }
                Ok(())
            }
            BTreeNode::Internal { keys, children } => {
                if children.len() != keys.len() + 1 {
                    return Err(DbError::Invariant(
                        "internal node children count != keys count + 1".into(),
                    ));
                }
                for w in keys.windows(2) {
                    if w[0].cmp_key(&w[1])? != Ordering::Less {
                        return Err(DbError::Invariant("internal keys not strictly ascending".into()));
                    }
                }
                for (i, &child) in children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(&keys[i - 1]) };
                    let child_upper = if i == keys.len() { upper } else { Some(&keys[i]) };
                    self.check_subtree(buffer, child, child_lower, child_upper)?;
                }
                Ok(())
            }
        }
    }

    /// Frees every page backing the index. Consumes `self`: the index is
    /// gone afterward, not merely empty.
    pub fn delete(self, buffer: &mut BufferManager) -> DbResult<()> {
        free_subtree(buffer, self.root_page_id)
    }
}

fn free_subtree(buffer: &mut BufferManager, page_id: PageId) -> DbResult<()> {
    if let BTreeNode::Internal { children, .. } = read_node(buffer, page_id)? {
        for child in children {
            free_subtree(buffer, child)?;
        }
    }
    buffer.pin_page(page_id)?;
    buffer.free_page(page_id)
}

/// A forward, key-ordered cursor over one index's leaves. Unlike
/// `std::iter::Iterator`, `next` takes the buffer pool explicitly since
/// advancing the scan pins and unpins pages.
pub struct IndexScan {
    leaf_page_id: PageId,
    entries: Vec<(SearchKey, RecordId)>,
    pos: usize,
}

impl IndexScan {
    fn starting_at(buffer: &mut BufferManager, leaf_page_id: PageId) -> DbResult<Self> {
        let mut scan = Self { leaf_page_id: PageId::INVALID, entries: Vec::new(), pos: 0 };
        scan.load_leaf(buffer, leaf_page_id)?;
        Ok(scan)
    }

    fn load_leaf(&mut self, buffer: &mut BufferManager, page_id: PageId) -> DbResult<()> {
        match read_node(buffer, page_id)? {
            BTreeNode::Leaf { entries, next_leaf } => {
                self.entries = entries;
                self.pos = 0;
                self.leaf_page_id = next_leaf;
                Ok(())
            }
            BTreeNode::Internal { .. } => Err(DbError::Invariant("scan reached an internal node".into())),
        }
    }

    pub fn next(&mut self, buffer: &mut BufferManager) -> DbResult<Option<(SearchKey, RecordId)>> {
        loop {
            if self.pos < self.entries.len() {
                let item = self.entries[self.pos].clone();
                self.pos += 1;
                return Ok(Some(item));
            }
            if !self.leaf_page_id.is_valid() {
                return Ok(None);
            }
            let next_page = self.leaf_page_id;
            self.load_leaf(buffer, next_page)?;
        }
    }
}

#[cfg(test)]
mod tests;

//! Tournament-tree (tree of losers) k-way merge over a fixed set of
//! already-sorted runs.
//!
//! Leaves are padded out to the next power of two so the tree shape never
//! needs special-casing for odd run counts; padding leaves are permanently
//! exhausted and sort as "larger than everything" so they never win.

use std::cmp::Ordering;
use std::rc::Rc;

use common::DbResult;

use buffer::BufferManager;

use crate::run::{Run, RunReader};

type Comparator = Rc<dyn Fn(&[u8], &[u8]) -> Ordering>;

/// `a` loses ties to `b`: `None` (an exhausted run) never wins.
fn a_not_worse(a: &Option<Vec<u8>>, b: &Option<Vec<u8>>, cmp: &Comparator) -> bool {
    match (a, b) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => cmp(a, b) != Ordering::Greater,
    }
}

/// Drives a k-way merge of `readers` using an array-based tree of losers.
/// `winner[n..2n)` holds the leaves, `loser[1..n)` the internal-node
/// losers, and `loser[0]` the index of the current overall winner.
pub struct LoserTree {
    readers: Vec<RunReader>,
    heads: Vec<Option<Vec<u8>>>,
    loser: Vec<usize>,
    n: usize,
    comparator: Comparator,
}

impl LoserTree {
    pub fn build(
        buffer: &mut BufferManager,
        runs: Vec<Run>,
        record_width: usize,
        comparator: Comparator,
    ) -> DbResult<Self> {
        let k = runs.len();
        let n = k.max(1).next_power_of_two();

        let mut readers = Vec::with_capacity(k);
        let mut heads = Vec::with_capacity(n);
        for run in runs {
            let mut reader = RunReader::open(buffer, run, record_width)?;
            let head = reader.next(buffer)?;
            readers.push(reader);
            heads.push(head);
        }
        heads.resize(n, None);

        let mut winner = vec![0usize; 2 * n];
        for i in 0..n {
            winner[n + i] = i;
        }
        let mut loser = vec![0usize; n];
        for i in (1..n).rev() {
            let left = winner[2 * i];
            let right = winner[2 * i + 1];
            if a_not_worse(&heads[left], &heads[right], &comparator) {
                winner[i] = left;
                loser[i] = right;
            } else {
                winner[i] = right;
                loser[i] = left;
            }
        }
        loser[0] = if n == 1 { 0 } else { winner[1] };

        Ok(Self { readers, heads, loser, n, comparator })
    }

    fn replay(&mut self, leaf: usize) {
        let mut current = leaf;
        let mut pos = (self.n + leaf) / 2;
        while pos >= 1 {
            if a_not_worse(&self.heads[self.loser[pos]], &self.heads[current], &self.comparator) {
                std::mem::swap(&mut self.loser[pos], &mut current);
            }
            if pos == 1 {
                break;
            }
            pos /= 2;
        }
        self.loser[0] = current;
    }

    pub fn next(&mut self, buffer: &mut BufferManager) -> DbResult<Option<Vec<u8>>> {
        if self.n == 0 {
            return Ok(None);
        }
        let winner = self.loser[0];
        let record = match self.heads[winner].take() {
            Some(record) => record,
            None => return Ok(None),
        };
        if winner < self.readers.len() {
            self.heads[winner] = self.readers[winner].next(buffer)?;
        }
        if self.n > 1 {
            self.replay(winner);
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunWriter;
    use common::ReplacementPolicyKind;
    use storage::DiskManager;
    use tempfile::tempdir;

    fn pool(page_size: usize, frames: usize) -> (tempfile::TempDir, BufferManager) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.db");
        let disk = DiskManager::create(&path, 4_000, page_size).unwrap();
        (dir, BufferManager::new(disk, frames, ReplacementPolicyKind::Lru))
    }

    fn int_cmp() -> Comparator {
        Rc::new(|a: &[u8], b: &[u8]| {
            i32::from_be_bytes(a.try_into().unwrap()).cmp(&i32::from_be_bytes(b.try_into().unwrap()))
        })
    }

    fn write_run(buffer: &mut BufferManager, values: &[i32]) -> Run {
        let mut writer = RunWriter::new(buffer.page_size(), 4).unwrap();
        for v in values {
            writer.push(buffer, v.to_be_bytes().to_vec()).unwrap();
        }
        writer.finish(buffer).unwrap()
    }

    #[test]
    fn merges_several_sorted_runs_into_one_order() {
        let (_dir, mut buf) = pool(64, 64);
        let runs = vec![
            write_run(&mut buf, &[1, 4, 9, 20]),
            write_run(&mut buf, &[2, 3, 3, 50]),
            write_run(&mut buf, &[-5, 0]),
        ];
        let mut tree = LoserTree::build(&mut buf, runs, 4, int_cmp()).unwrap();
        let mut out = Vec::new();
        while let Some(rec) = tree.next(&mut buf).unwrap() {
            out.push(i32::from_be_bytes(rec.try_into().unwrap()));
        }
        let mut expected = vec![1, 4, 9, 20, 2, 3, 3, 50, -5, 0];
        expected.sort();
        assert_eq!(out, expected);
    }

    #[test]
    fn single_run_passes_through_unchanged() {
        let (_dir, mut buf) = pool(64, 64);
        let runs = vec![write_run(&mut buf, &[1, 2, 3])];
        let mut tree = LoserTree::build(&mut buf, runs, 4, int_cmp()).unwrap();
        let mut out = Vec::new();
        while let Some(rec) = tree.next(&mut buf).unwrap() {
            out.push(i32::from_be_bytes(rec.try_into().unwrap()));
        }
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn empty_run_set_yields_nothing() {
        let (_dir, mut buf) = pool(64, 64);
        let mut tree = LoserTree::build(&mut buf, Vec::new(), 4, int_cmp()).unwrap();
        assert_eq!(tree.next(&mut buf).unwrap(), None);
    }
}

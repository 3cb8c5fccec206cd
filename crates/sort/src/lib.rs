//! Disk-backed sort for data sets larger than the buffer pool: replacement
//! selection builds long initial runs, then a fan-in-bounded tournament
//! merge combines them into one output run.

mod merge;
mod run;

pub use run::{free_run, Run, RunReader};

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use tracing::debug;

use common::DbResult;

use buffer::BufferManager;

use merge::LoserTree;
use run::RunWriter;

pub type Comparator = Rc<dyn Fn(&[u8], &[u8]) -> Ordering>;

struct HeapEntry {
    run_tag: u64,
    record: Vec<u8>,
    comparator: Comparator,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap; invert both fields so `pop()` yields the
    // smallest run tag, and within a tag the smallest record.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .run_tag
            .cmp(&self.run_tag)
            .then_with(|| (other.comparator)(&other.record, &self.record))
    }
}

/// External merge sort over fixed-width byte records.
///
/// `heap_capacity` is the replacement-selection heap size `M` (bounded by
/// the working set the buffer pool can hold); `max_fan_in` bounds how many
/// runs a single merge pass combines, derived from the frames left over
/// once [`common::Config::sort_reserved_frames`] are set aside for the
/// output page.
pub struct ExternalSort {
    record_width: usize,
    heap_capacity: usize,
    max_fan_in: usize,
    comparator: Comparator,
}

impl ExternalSort {
    pub fn new(
        record_width: usize,
        heap_capacity: usize,
        max_fan_in: usize,
        comparator: Comparator,
    ) -> Self {
        Self { record_width, heap_capacity: heap_capacity.max(1), max_fan_in: max_fan_in.max(2), comparator }
    }

    /// Sorts `input` and returns the single output run. Every intermediate
    /// run produced along the way is freed; the final run is left for the
    /// caller to read and eventually free.
    pub fn sort(
        &self,
        buffer: &mut BufferManager,
        input: impl Iterator<Item = Vec<u8>>,
    ) -> DbResult<Run> {
        let runs = self.generate_initial_runs(buffer, input)?;
        debug!(run_count = runs.len(), "generated initial runs, starting merge");
        self.merge_runs(buffer, runs)
    }

    fn generate_initial_runs(
        &self,
        buffer: &mut BufferManager,
        mut input: impl Iterator<Item = Vec<u8>>,
    ) -> DbResult<Vec<Run>> {
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        for _ in 0..self.heap_capacity {
            match input.next() {
                Some(record) => heap.push(HeapEntry { run_tag: 0, record, comparator: self.comparator.clone() }),
                None => break,
            }
        }

        let mut runs = Vec::new();
        let mut writer: Option<RunWriter> = None;
        let mut current_tag = 0u64;
        let mut last_emitted: Option<Vec<u8>> = None;

        while let Some(top) = heap.pop() {
            if writer.is_none() || top.run_tag != current_tag {
                if let Some(w) = writer.take() {
                    runs.push(w.finish(buffer)?);
                }
                current_tag = top.run_tag;
                last_emitted = None;
                writer = Some(RunWriter::new(buffer.page_size(), self.record_width)?);
            }

            let w = writer.as_mut().expect("writer just initialized above");
            w.push(buffer, top.record.clone())?;
            last_emitted = Some(top.record);

            if let Some(next_record) = input.next() {
                let belongs_to_next_run = match &last_emitted {
                    Some(emitted) => (self.comparator)(&next_record, emitted) == Ordering::Less,
                    None => false,
                };
                let tag = if belongs_to_next_run { current_tag + 1 } else { current_tag };
                heap.push(HeapEntry { run_tag: tag, record: next_record, comparator: self.comparator.clone() });
            }
        }
        if let Some(w) = writer.take() {
            runs.push(w.finish(buffer)?);
        }
        Ok(runs)
    }

    fn merge_runs(&self, buffer: &mut BufferManager, mut runs: Vec<Run>) -> DbResult<Run> {
        if runs.is_empty() {
            let writer = RunWriter::new(buffer.page_size(), self.record_width)?;
            return writer.finish(buffer);
        }
        while runs.len() > 1 {
            debug!(run_count = runs.len(), fan_in = self.max_fan_in, "merge pass");
            let mut next_runs = Vec::new();
            for chunk in runs.chunks(self.max_fan_in) {
                if chunk.len() == 1 {
                    next_runs.push(chunk[0]);
                    continue;
                }
                let merged = self.merge_group(buffer, chunk.to_vec())?;
                for run in chunk {
                    run::free_run(buffer, *run)?;
                }
                next_runs.push(merged);
            }
            runs = next_runs;
        }
        Ok(runs.remove(0))
    }

    fn merge_group(&self, buffer: &mut BufferManager, runs: Vec<Run>) -> DbResult<Run> {
        let mut tree = LoserTree::build(buffer, runs, self.record_width, self.comparator.clone())?;
        let mut writer = RunWriter::new(buffer.page_size(), self.record_width)?;
        while let Some(record) = tree.next(buffer)? {
            writer.push(buffer, record)?;
        }
        writer.finish(buffer)
    }
}

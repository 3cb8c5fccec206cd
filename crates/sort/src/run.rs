//! On-disk layout for one run: a chain of pages, each holding a next-page
//! pointer, a record count, and fixed-width records back to back. Building
//! and draining a chain is split into [`RunWriter`] and [`RunReader`] so
//! neither side needs to hold the whole run in memory.

use codec::{read_i32, read_u16, write_i32, write_u16};
use common::{DbError, DbResult, PageId};

use buffer::{BufferManager, UnpinMode};

const HEADER_LEN: usize = 6; // next-page id (4) + record count (2)

pub fn records_per_page(page_size: usize, record_width: usize) -> usize {
    if page_size <= HEADER_LEN || record_width == 0 {
        return 0;
    }
    (page_size - HEADER_LEN) / record_width
}

fn encode_run_page(
    page_size: usize,
    next_page: PageId,
    records: &[Vec<u8>],
    record_width: usize,
) -> DbResult<Vec<u8>> {
    let mut buf = vec![0u8; page_size];
    write_i32(&mut buf[0..4], next_page.0)?;
    write_u16(&mut buf[4..6], records.len() as u16)?;
    let mut cursor = HEADER_LEN;
    for record in records {
        if record.len() != record_width {
            return Err(DbError::Invariant(format!(
                "run record is {} bytes, expected {record_width}",
                record.len()
            )));
        }
        buf[cursor..cursor + record_width].copy_from_slice(record);
        cursor += record_width;
    }
    Ok(buf)
}

fn decode_run_page(buf: &[u8], record_width: usize) -> DbResult<(PageId, Vec<Vec<u8>>)> {
    let next_page = PageId(read_i32(&buf[0..4])?);
    let count = read_u16(&buf[4..6])? as usize;
    let mut records = Vec::with_capacity(count);
    let mut cursor = HEADER_LEN;
    for _ in 0..count {
        records.push(buf[cursor..cursor + record_width].to_vec());
        cursor += record_width;
    }
    Ok((next_page, records))
}

/// `{firstPageID, totalRecordCount}` for one materialized run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub first_page_id: PageId,
    pub record_count: u64,
}

/// Appends fixed-width records to a freshly allocated page chain, flushing
/// a page whenever it fills and patching the previous page's next-page
/// field once the following page's ID is known.
pub struct RunWriter {
    record_width: usize,
    capacity_per_page: usize,
    pending: Vec<Vec<u8>>,
    first_page_id: PageId,
    last_page_id: PageId,
    count: u64,
}

impl RunWriter {
    pub fn new(page_size: usize, record_width: usize) -> DbResult<Self> {
        let capacity_per_page = records_per_page(page_size, record_width);
        if capacity_per_page == 0 {
            return Err(DbError::InvalidArgument(format!(
                "record width {record_width} does not fit in a {page_size}-byte page"
            )));
        }
        Ok(Self {
            record_width,
            capacity_per_page,
            pending: Vec::new(),
            first_page_id: PageId::INVALID,
            last_page_id: PageId::INVALID,
            count: 0,
        })
    }

    pub fn push(&mut self, buffer: &mut BufferManager, record: Vec<u8>) -> DbResult<()> {
        if record.len() != self.record_width {
            return Err(DbError::InvalidArgument(format!(
                "record is {} bytes, run expects {}",
                record.len(),
                self.record_width
            )));
        }
        self.pending.push(record);
        self.count += 1;
        if self.pending.len() == self.capacity_per_page {
            self.flush(buffer)?;
        }
        Ok(())
    }

    fn flush(&mut self, buffer: &mut BufferManager) -> DbResult<()> {
        let page_size = buffer.page_size();
        let bytes = encode_run_page(page_size, PageId::INVALID, &self.pending, self.record_width)?;
        let (page_id, frame) = buffer.new_page()?;
        buffer.page_data_mut(frame).copy_from_slice(&bytes);
        buffer.unpin_page(page_id, UnpinMode::Dirty)?;

        if self.last_page_id.is_valid() {
            let prev = self.last_page_id;
            let frame = buffer.pin_page(prev)?;
            codec::write_i32(&mut buffer.page_data_mut(frame)[0..4], page_id.0)?;
            buffer.unpin_page(prev, UnpinMode::Dirty)?;
        } else {
            self.first_page_id = page_id;
        }
        self.last_page_id = page_id;
        self.pending.clear();
        Ok(())
    }

    pub fn finish(mut self, buffer: &mut BufferManager) -> DbResult<Run> {
        if !self.pending.is_empty() {
            self.flush(buffer)?;
        }
        Ok(Run { first_page_id: self.first_page_id, record_count: self.count })
    }
}

/// Pulls fixed-width records off a run's page chain in order.
pub struct RunReader {
    record_width: usize,
    next_page: PageId,
    buffered: Vec<Vec<u8>>,
    pos: usize,
}

impl RunReader {
    pub fn open(buffer: &mut BufferManager, run: Run, record_width: usize) -> DbResult<Self> {
        let mut reader = Self { record_width, next_page: PageId::INVALID, buffered: Vec::new(), pos: 0 };
        if run.first_page_id.is_valid() {
            reader.load_page(buffer, run.first_page_id)?;
        }
        Ok(reader)
    }

    fn load_page(&mut self, buffer: &mut BufferManager, page_id: PageId) -> DbResult<()> {
        let frame = buffer.pin_page(page_id)?;
        let (next_page, records) = decode_run_page(buffer.page_data(frame), self.record_width)?;
        buffer.unpin_page(page_id, UnpinMode::Clean)?;
        self.buffered = records;
        self.pos = 0;
        self.next_page = next_page;
        Ok(())
    }

    pub fn next(&mut self, buffer: &mut BufferManager) -> DbResult<Option<Vec<u8>>> {
        loop {
            if self.pos < self.buffered.len() {
                let record = self.buffered[self.pos].clone();
                self.pos += 1;
                return Ok(Some(record));
            }
            if !self.next_page.is_valid() {
                return Ok(None);
            }
            let page_id = self.next_page;
            self.load_page(buffer, page_id)?;
        }
    }
}

/// Walks a run's page chain, freeing every page. The run must already be
/// fully drained (no outstanding `RunReader`).
pub fn free_run(buffer: &mut BufferManager, run: Run) -> DbResult<()> {
    let mut page_id = run.first_page_id;
    while page_id.is_valid() {
        let frame = buffer.pin_page(page_id)?;
        let next = PageId(read_i32(&buffer.page_data(frame)[0..4])?);
        buffer.unpin_page(page_id, UnpinMode::Clean)?;
        buffer.pin_page(page_id)?;
        buffer.free_page(page_id)?;
        page_id = next;
    }
    Ok(())
}

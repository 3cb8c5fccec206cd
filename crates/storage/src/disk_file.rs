use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use common::DbResult;

/// A flat file of fixed-size pages. Performs positioned full-page I/O only;
/// it knows nothing about allocation or page contents.
#[derive(Debug)]
pub struct DiskFile {
    file: File,
    page_size: usize,
    num_pages: u64,
}

impl DiskFile {
    /// Truncates/creates `path` to exactly `num_pages * page_size` bytes.
    /// Fails when `num_pages < 2`.
    pub fn create(path: &Path, num_pages: u64, page_size: usize) -> DbResult<Self> {
        if num_pages < 2 {
            return Err(common::DbError::InvalidArgument(
                "disk file requires at least two pages".into(),
            ));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(num_pages * page_size as u64)?;
        Ok(Self {
            file,
            page_size,
            num_pages,
        })
    }

    /// Opens an existing file; succeeds only if its size is a positive
    /// multiple of `page_size` with at least two pages.
    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % page_size as u64 != 0 || len / (page_size as u64) < 2 {
            return Err(common::DbError::Storage(format!(
                "file length {len} is not a valid multiple of page size {page_size} with >= 2 pages"
            )));
        }
        let num_pages = len / page_size as u64;
        Ok(Self {
            file,
            page_size,
            num_pages,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> u64 {
        self.num_pages
    }

    /// Extends the file by `extra_pages` zero-filled pages.
    pub fn grow_by(&mut self, extra_pages: u64) -> DbResult<()> {
        self.num_pages += extra_pages;
        self.file
            .set_len(self.num_pages * self.page_size as u64)?;
        Ok(())
    }

    /// Reads page `n` into `buf`. `buf` must be exactly `page_size` bytes.
    /// A short read is treated as non-recoverable I/O failure.
    pub fn read_page(&mut self, n: u64, buf: &mut [u8]) -> DbResult<()> {
        self.check_bounds(n, buf.len())?;
        self.file.seek(SeekFrom::Start(n * self.page_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes `buf` (exactly `page_size` bytes) to page `n`.
    pub fn write_page(&mut self, n: u64, buf: &[u8]) -> DbResult<()> {
        self.check_bounds(n, buf.len())?;
        self.file.seek(SeekFrom::Start(n * self.page_size as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn check_bounds(&self, n: u64, buf_len: usize) -> DbResult<()> {
        if buf_len != self.page_size {
            return Err(common::DbError::InvalidArgument(format!(
                "buffer length {buf_len} does not match page size {}",
                self.page_size
            )));
        }
        if n >= self.num_pages {
            return Err(common::DbError::InvalidArgument(format!(
                "page {n} is out of range (file has {} pages)",
                self.num_pages
            )));
        }
        Ok(())
    }
}

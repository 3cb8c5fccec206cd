//! Disk file and disk manager: paged storage with bitmap allocation, a
//! linked-list file directory, and a small LRU cache for header/bitmap
//! pages.

mod bitmap;
mod directory;
mod disk_file;
mod header_cache;

pub use disk_file::DiskFile;
pub use directory::{DirEntry, NAME_MAXLEN};

use common::{Config, DbError, DbResult, PageId};
use header_cache::HeaderCache;
use std::path::Path;
use tracing::{debug, trace};

const HEADER_CACHE_CAPACITY: usize = 16;

/// Allocates/deallocates page runs, maintains named file-directory entries,
/// and exposes raw page I/O with allocation validation. The sole owner of
/// bitmap and directory page bytes; everything else goes straight to the
/// underlying [`DiskFile`].
pub struct DiskManager {
    file: DiskFile,
    page_size: usize,
    num_bitmap_pages: u64,
    header_cache: HeaderCache,
    /// Global bit-index cursor accelerating the next single-page scan.
    alloc_cursor: u64,
    read_count: u64,
    write_count: u64,
}

fn bits_per_page(page_size: usize) -> u64 {
    page_size as u64 * 8
}

fn num_bitmap_pages_for(num_pages: u64, page_size: usize) -> u64 {
    (num_pages + bits_per_page(page_size) - 1) / bits_per_page(page_size)
}

impl DiskManager {
    /// Creates a fresh database file of `num_pages` pages, marking page 0
    /// and the bitmap pages themselves as allocated, with an empty
    /// directory.
    pub fn create(path: &Path, num_pages: u64, page_size: usize) -> DbResult<Self> {
        let mut file = DiskFile::create(path, num_pages, page_size)?;
        let num_bitmap_pages = num_bitmap_pages_for(num_pages, page_size);

        for bitmap_page_index in 0..num_bitmap_pages {
            let buf = vec![0u8; page_size];
            file.write_page(1 + bitmap_page_index, &buf)?;
        }

        let mut manager = Self {
            file,
            page_size,
            num_bitmap_pages,
            header_cache: HeaderCache::new(HEADER_CACHE_CAPACITY),
            alloc_cursor: 0,
            read_count: 0,
            write_count: 0,
        };

        manager.mark_allocated(0)?;
        for bitmap_page_index in 0..num_bitmap_pages {
            manager.mark_allocated(1 + bitmap_page_index)?;
        }

        let dir_page = directory::encode(page_size, -1, &[], Some(num_pages as u32), true)?;
        manager.write_header_page(0, dir_page)?;
        manager.flush_all_pages()?;
        Ok(manager)
    }

    /// Opens an existing database file, recovering `num_bitmap_pages` from
    /// its total page count.
    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        let file = DiskFile::open(path, page_size)?;
        let num_bitmap_pages = num_bitmap_pages_for(file.num_pages(), page_size);
        Ok(Self {
            file,
            page_size,
            num_bitmap_pages,
            header_cache: HeaderCache::new(HEADER_CACHE_CAPACITY),
            alloc_cursor: 0,
            read_count: 0,
            write_count: 0,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> u64 {
        self.file.num_pages()
    }

    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    fn is_header_page(&self, page_num: u64) -> bool {
        page_num == 0 || (1..=self.num_bitmap_pages).contains(&page_num)
    }

    fn load_header_page(&mut self, page_num: u64) -> DbResult<()> {
        if self.header_cache.get(page_num).is_some() {
            return Ok(());
        }
        let mut buf = vec![0u8; self.page_size];
        self.file.read_page(page_num, &mut buf)?;
        self.read_count += 1;
        if let Some((evicted_num, evicted_bytes)) = self.header_cache.insert(page_num, buf) {
            trace!(page = evicted_num, "header cache evicting dirty page");
            self.file.write_page(evicted_num, &evicted_bytes)?;
            self.write_count += 1;
        }
        Ok(())
    }

    fn write_header_page(&mut self, page_num: u64, bytes: Vec<u8>) -> DbResult<()> {
        if let Some((evicted_num, evicted_bytes)) = self.header_cache.insert(page_num, bytes) {
            self.file.write_page(evicted_num, &evicted_bytes)?;
            self.write_count += 1;
        }
        self.header_cache.mark_dirty(page_num);
        Ok(())
    }

    /// Flushes every dirty header/bitmap/directory page to disk.
    pub fn flush_all_pages(&mut self) -> DbResult<()> {
        for (page_num, bytes) in self.header_cache.drain_dirty() {
            self.file.write_page(page_num, &bytes)?;
            self.write_count += 1;
        }
        Ok(())
    }

    fn bit_is_set(&mut self, bit: u64) -> DbResult<bool> {
        let loc = bitmap::locate(bit, self.page_size);
        let page_num = 1 + loc.bitmap_page_index;
        self.load_header_page(page_num)?;
        let cached = self.header_cache.get(page_num).unwrap();
        Ok(bitmap::is_set(&cached.bytes, loc.byte_offset * 8 + loc.bit_index as usize))
    }

    fn mark_allocated(&mut self, bit: u64) -> DbResult<()> {
        self.set_bit(bit, true)
    }

    fn mark_free(&mut self, bit: u64) -> DbResult<()> {
        self.set_bit(bit, false)
    }

    fn set_bit(&mut self, bit: u64, allocated: bool) -> DbResult<()> {
        let loc = bitmap::locate(bit, self.page_size);
        let page_num = 1 + loc.bitmap_page_index;
        self.load_header_page(page_num)?;
        let cached = self.header_cache.get(page_num).unwrap();
        let bit_in_page = loc.byte_offset * 8 + loc.bit_index as usize;
        if allocated {
            bitmap::set(&mut cached.bytes, bit_in_page);
        } else {
            bitmap::clear(&mut cached.bytes, bit_in_page);
        }
        self.header_cache.mark_dirty(page_num);
        Ok(())
    }

    fn is_allocated(&mut self, page_id: PageId) -> DbResult<bool> {
        if !page_id.is_valid() || page_id.0 as u64 >= self.num_pages() {
            return Ok(false);
        }
        self.bit_is_set(page_id.0 as u64)
    }

    /// Allocates a single free page, advancing the scan cursor so the next
    /// call resumes near here instead of rescanning from zero.
    pub fn allocate_page(&mut self) -> DbResult<PageId> {
        let total = self.num_pages();
        let start = self.alloc_cursor.min(total.saturating_sub(1));
        for offset in 0..total {
            let candidate = (start + offset) % total;
            if !self.bit_is_set(candidate)? {
                self.mark_allocated(candidate)?;
                self.alloc_cursor = candidate + 1;
                debug!(page = candidate, "allocated page");
                return Ok(PageId(candidate as i32));
            }
        }
        Err(DbError::Capacity("no free page available".into()))
    }

    /// Allocates a contiguous run of `run_size` free pages, first-fit from
    /// the start of the addressable space.
    pub fn allocate_pages(&mut self, run_size: u64) -> DbResult<PageId> {
        if run_size == 0 {
            return Err(DbError::InvalidArgument("run size must be positive".into()));
        }
        let total = self.num_pages();
        if run_size > total {
            return Err(DbError::Capacity("no run of that size fits in the file".into()));
        }
        'candidates: for start in 0..=(total - run_size) {
            for offset in 0..run_size {
                if self.bit_is_set(start + offset)? {
                    continue 'candidates;
                }
            }
            for offset in 0..run_size {
                self.mark_allocated(start + offset)?;
            }
            debug!(start, run_size, "allocated run");
            return Ok(PageId(start as i32));
        }
        Err(DbError::Capacity(format!(
            "no free run of {run_size} pages available"
        )))
    }

    pub fn deallocate_page(&mut self, page_id: PageId) -> DbResult<()> {
        self.deallocate_pages(page_id, 1)
    }

    pub fn deallocate_pages(&mut self, start: PageId, count: u64) -> DbResult<()> {
        if !start.is_valid() {
            return Err(DbError::InvalidArgument("invalid page id".into()));
        }
        let start_bit = start.0 as u64;
        for offset in 0..count {
            self.mark_free(start_bit + offset)?;
        }
        if start_bit < self.alloc_cursor {
            self.alloc_cursor = start_bit;
        }
        Ok(())
    }

    /// Counts pages currently marked allocated, across every bitmap page.
    pub fn get_alloc_count(&mut self) -> DbResult<u64> {
        let mut total = 0u64;
        for bitmap_page_index in 0..self.num_bitmap_pages {
            let page_num = 1 + bitmap_page_index;
            self.load_header_page(page_num)?;
            let cached = self.header_cache.get(page_num).unwrap();
            total += bitmap::count_set(&cached.bytes);
        }
        Ok(total)
    }

    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> DbResult<()> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidArgument("invalid page id".into()));
        }
        if !self.is_allocated(page_id)? {
            return Err(DbError::InvalidArgument(format!(
                "page {page_id} is not allocated"
            )));
        }
        let page_num = page_id.0 as u64;
        if self.is_header_page(page_num) {
            self.load_header_page(page_num)?;
            buf.copy_from_slice(&self.header_cache.get(page_num).unwrap().bytes);
        } else {
            self.file.read_page(page_num, buf)?;
        }
        self.read_count += 1;
        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> DbResult<()> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidArgument("invalid page id".into()));
        }
        if !self.is_allocated(page_id)? {
            return Err(DbError::InvalidArgument(format!(
                "page {page_id} is not allocated"
            )));
        }
        let page_num = page_id.0 as u64;
        if self.is_header_page(page_num) {
            self.write_header_page(page_num, buf.to_vec())?;
        } else {
            self.file.write_page(page_num, buf)?;
        }
        self.write_count += 1;
        Ok(())
    }

    fn directory_chain(&mut self) -> DbResult<Vec<(u64, directory::DecodedDirPage)>> {
        let mut pages = Vec::new();
        let mut page_num = 0u64;
        loop {
            self.load_header_page(page_num)?;
            let bytes = self.header_cache.get(page_num).unwrap().bytes.clone();
            let decoded = directory::decode(&bytes, page_num == 0)?;
            let next = decoded.next_page;
            pages.push((page_num, decoded));
            if next < 0 {
                break;
            }
            page_num = next as u64;
        }
        Ok(pages)
    }

    pub fn add_file_entry(&mut self, name: &str, first_page_id: PageId) -> DbResult<()> {
        directory::validate_name(name)?;
        if !first_page_id.is_valid() || first_page_id.0 as u64 >= self.num_pages() {
            return Err(DbError::InvalidArgument("out-of-range page id".into()));
        }
        let chain = self.directory_chain()?;
        let lower = name.to_lowercase();
        for (_, page) in &chain {
            if page.entries.iter().any(|e| e.name.to_lowercase() == lower) {
                return Err(DbError::InvalidArgument(format!(
                    "duplicate file entry {name:?}"
                )));
            }
        }

        for (page_num, page) in &chain {
            let is_first = *page_num == 0;
            let capacity = directory::entry_capacity(self.page_size, is_first);
            if page.entries.len() < capacity {
                let mut entries = page.entries.clone();
                entries.push(DirEntry {
                    page_id: first_page_id.0,
                    name: name.to_string(),
                });
                let total_pages = if is_first { Some(self.num_pages() as u32) } else { None };
                let bytes = directory::encode(self.page_size, page.next_page, &entries, total_pages, is_first)?;
                self.write_header_page(*page_num, bytes)?;
                return Ok(());
            }
        }

        // Every existing directory page is full: extend the chain.
        let new_page = self.allocate_page()?;
        let (last_num, last_page) = chain.last().unwrap();
        let last_is_first = *last_num == 0;
        let total_pages = if last_is_first { Some(self.num_pages() as u32) } else { None };
        let linked = directory::encode(
            self.page_size,
            new_page.0,
            &last_page.entries,
            total_pages,
            last_is_first,
        )?;
        self.write_header_page(*last_num, linked)?;

        let entries = vec![DirEntry {
            page_id: first_page_id.0,
            name: name.to_string(),
        }];
        let new_bytes = directory::encode(self.page_size, -1, &entries, None, false)?;
        self.write_header_page(new_page.0 as u64, new_bytes)?;
        Ok(())
    }

    pub fn delete_file_entry(&mut self, name: &str) -> DbResult<()> {
        let lower = name.to_lowercase();
        let chain = self.directory_chain()?;
        for (page_num, page) in &chain {
            if let Some(pos) = page.entries.iter().position(|e| e.name.to_lowercase() == lower) {
                let mut entries = page.entries.clone();
                entries[pos].page_id = -1;
                let is_first = *page_num == 0;
                let total_pages = if is_first { Some(self.num_pages() as u32) } else { None };
                let bytes = directory::encode(self.page_size, page.next_page, &entries, total_pages, is_first)?;
                self.write_header_page(*page_num, bytes)?;
                return Ok(());
            }
        }
        Err(DbError::InvalidArgument(format!("no such file entry {name:?}")))
    }

    pub fn get_file_entry(&mut self, name: &str) -> DbResult<Option<PageId>> {
        let lower = name.to_lowercase();
        let chain = self.directory_chain()?;
        for (_, page) in &chain {
            if let Some(entry) = page.entries.iter().find(|e| e.name.to_lowercase() == lower && e.page_id >= 0) {
                return Ok(Some(PageId(entry.page_id)));
            }
        }
        Ok(None)
    }
}

/// Narrow façade wiring a [`DiskManager`] up per [`Config`], analogous to
/// the storage half of a full database connection without any query
/// execution behind it.
pub struct Engine {
    pub disk: DiskManager,
}

impl Engine {
    pub fn create(config: &Config, path: &Path, num_pages: u64) -> DbResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let disk = DiskManager::create(path, num_pages, config.page_size)?;
        Ok(Self { disk })
    }

    pub fn open(config: &Config, path: &Path) -> DbResult<Self> {
        let disk = DiskManager::open(path, config.page_size)?;
        Ok(Self { disk })
    }
}

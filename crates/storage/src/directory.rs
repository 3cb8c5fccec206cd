//! File directory: a linked list of directory pages holding named
//! `(page ID, name)` entries. Page 0 is always the first directory page
//! and additionally carries a trailing "total pages in file" field.

use codec::{read_i32, read_str_fixed, read_u16, write_i32, write_str_fixed, write_u16};
use common::{DbError, DbResult};

pub const ENTRY_BYTES: usize = 56;
const NAME_FIELD_BYTES: usize = 52;
pub const NAME_MAXLEN: usize = 50;
const HEADER_BYTES: usize = 8; // next-page i32 + entry count u32
const FOOTER_BYTES: usize = 4; // total-pages u32, page 0 only

#[derive(Clone, Debug, PartialEq)]
pub struct DirEntry {
    pub page_id: i32,
    pub name: String,
}

pub fn entry_capacity(page_size: usize, is_first: bool) -> usize {
    let usable = if is_first {
        page_size - HEADER_BYTES - FOOTER_BYTES
    } else {
        page_size - HEADER_BYTES
    };
    usable / ENTRY_BYTES
}

pub fn validate_name(name: &str) -> DbResult<()> {
    if name.as_bytes().len() > NAME_MAXLEN {
        return Err(DbError::InvalidArgument(format!(
            "file name {name:?} exceeds {NAME_MAXLEN} bytes"
        )));
    }
    Ok(())
}

/// Encodes a directory page. `total_pages` must be `Some` iff `is_first`.
pub fn encode(
    page_size: usize,
    next_page: i32,
    entries: &[DirEntry],
    total_pages: Option<u32>,
    is_first: bool,
) -> DbResult<Vec<u8>> {
    let mut buf = vec![0u8; page_size];
    write_i32(&mut buf[0..4], next_page)?;
    let mut count_buf = [0u8; 2];
    write_u16(&mut count_buf, entries.len() as u16)?;
    // entry count is a u32 per the layout; write high half zero, low half as u16 pair.
    buf[4..6].copy_from_slice(&[0, 0]);
    buf[6..8].copy_from_slice(&count_buf);

    let mut offset = HEADER_BYTES;
    for entry in entries {
        write_i32(&mut buf[offset..offset + 4], entry.page_id)?;
        write_str_fixed(&mut buf[offset + 4..offset + ENTRY_BYTES], &entry.name, NAME_FIELD_BYTES)?;
        offset += ENTRY_BYTES;
    }

    if is_first {
        let total = total_pages.ok_or_else(|| {
            DbError::Invariant("first directory page requires a total-pages footer".into())
        })?;
        let mut footer = [0u8; 4];
        write_u16(&mut footer[0..2], (total >> 16) as u16)?;
        write_u16(&mut footer[2..4], (total & 0xffff) as u16)?;
        buf[page_size - 4..page_size].copy_from_slice(&footer);
    }

    Ok(buf)
}

pub struct DecodedDirPage {
    pub next_page: i32,
    pub entries: Vec<DirEntry>,
    pub total_pages: Option<u32>,
}

pub fn decode(buf: &[u8], is_first: bool) -> DbResult<DecodedDirPage> {
    let next_page = read_i32(&buf[0..4])?;
    let count = read_u16(&buf[6..8])? as usize;
    let mut entries = Vec::with_capacity(count);
    let mut offset = HEADER_BYTES;
    for _ in 0..count {
        let page_id = read_i32(&buf[offset..offset + 4])?;
        let name = read_str_fixed(&buf[offset + 4..offset + ENTRY_BYTES], NAME_FIELD_BYTES)?;
        entries.push(DirEntry { page_id, name });
        offset += ENTRY_BYTES;
    }
    let total_pages = if is_first {
        let hi = read_u16(&buf[buf.len() - 4..buf.len() - 2])? as u32;
        let lo = read_u16(&buf[buf.len() - 2..buf.len()])? as u32;
        Some((hi << 16) | lo)
    } else {
        None
    };
    Ok(DecodedDirPage {
        next_page,
        entries,
        total_pages,
    })
}

//! Fixed-width byte codec shared by the search-key codec and the on-disk
//! page layouts: big-endian multi-byte integers, IEEE-754 bit patterns for
//! floats, fixed-byte-length UTF-8 strings, and the date/time/timestamp
//! encodings the storage layer relies on.

use common::{DbError, DbResult};

/// Encodes `value` as a two's-complement big-endian integer occupying
/// exactly `width` bytes (1..=8) of `buf`. Returns an error if `value`
/// does not fit in `width` bytes.
pub fn write_int_be(buf: &mut [u8], value: i64, width: usize) -> DbResult<()> {
    if buf.len() < width {
        return Err(DbError::Codec(format!(
            "buffer too small for {width}-byte integer"
        )));
    }
    if !fits_signed(value, width) {
        return Err(DbError::Codec(format!(
            "value {value} does not fit in {width} signed bytes"
        )));
    }
    let bytes = value.to_be_bytes();
    buf[..width].copy_from_slice(&bytes[8 - width..]);
    Ok(())
}

/// Reads a two's-complement big-endian integer of `width` bytes (1..=8),
/// sign-extended to `i64`.
pub fn read_int_be(buf: &[u8], width: usize) -> DbResult<i64> {
    if buf.len() < width {
        return Err(DbError::Codec(format!(
            "buffer too small for {width}-byte integer"
        )));
    }
    let sign_byte = if buf[0] & 0x80 != 0 { 0xffu8 } else { 0 };
    let mut bytes = [sign_byte; 8];
    bytes[8 - width..].copy_from_slice(&buf[..width]);
    Ok(i64::from_be_bytes(bytes))
}

fn fits_signed(value: i64, width: usize) -> bool {
    if width >= 8 {
        return true;
    }
    let bits = width as u32 * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}

pub fn write_u16(buf: &mut [u8], value: u16) -> DbResult<()> {
    if buf.len() < 2 {
        return Err(DbError::Codec("buffer too small for u16".into()));
    }
    buf[..2].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub fn read_u16(buf: &[u8]) -> DbResult<u16> {
    if buf.len() < 2 {
        return Err(DbError::Codec("buffer too small for u16".into()));
    }
    Ok(u16::from_be_bytes([buf[0], buf[1]]))
}

pub fn write_i16(buf: &mut [u8], value: i16) -> DbResult<()> {
    write_int_be(buf, value as i64, 2)
}

pub fn read_i16(buf: &[u8]) -> DbResult<i16> {
    Ok(read_int_be(buf, 2)? as i16)
}

pub fn write_i32(buf: &mut [u8], value: i32) -> DbResult<()> {
    write_int_be(buf, value as i64, 4)
}

pub fn read_i32(buf: &[u8]) -> DbResult<i32> {
    Ok(read_int_be(buf, 4)? as i32)
}

pub fn write_i64(buf: &mut [u8], value: i64) -> DbResult<()> {
    write_int_be(buf, value, 8)
}

pub fn read_i64(buf: &[u8]) -> DbResult<i64> {
    read_int_be(buf, 8)
}

pub fn write_f32(buf: &mut [u8], value: f32) -> DbResult<()> {
    if buf.len() < 4 {
        return Err(DbError::Codec("buffer too small for f32".into()));
    }
    buf[..4].copy_from_slice(&value.to_bits().to_be_bytes());
    Ok(())
}

pub fn read_f32(buf: &[u8]) -> DbResult<f32> {
    if buf.len() < 4 {
        return Err(DbError::Codec("buffer too small for f32".into()));
    }
    let bits = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    Ok(f32::from_bits(bits))
}

pub fn write_f64(buf: &mut [u8], value: f64) -> DbResult<()> {
    if buf.len() < 8 {
        return Err(DbError::Codec("buffer too small for f64".into()));
    }
    buf[..8].copy_from_slice(&value.to_bits().to_be_bytes());
    Ok(())
}

pub fn read_f64(buf: &[u8]) -> DbResult<f64> {
    if buf.len() < 8 {
        return Err(DbError::Codec("buffer too small for f64".into()));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[..8]);
    Ok(f64::from_bits(u64::from_be_bytes(raw)))
}

/// Writes `s` as UTF-8 into exactly `len` bytes of `buf`, truncating on a
/// code point boundary and zero-padding the remainder.
pub fn write_str_fixed(buf: &mut [u8], s: &str, len: usize) -> DbResult<()> {
    if buf.len() < len {
        return Err(DbError::Codec("buffer too small for fixed string".into()));
    }
    let bytes = s.as_bytes();
    let cut = if bytes.len() <= len {
        bytes.len()
    } else {
        let mut cut = len;
        while cut > 0 && (bytes[cut] & 0xC0) == 0x80 {
            cut -= 1;
        }
        cut
    };
    buf[..cut].copy_from_slice(&bytes[..cut]);
    buf[cut..len].fill(0);
    Ok(())
}

/// Reads a fixed-length UTF-8 string, trimming trailing null bytes.
pub fn read_str_fixed(buf: &[u8], len: usize) -> DbResult<String> {
    if buf.len() < len {
        return Err(DbError::Codec("buffer too small for fixed string".into()));
    }
    let slice = &buf[..len];
    let trimmed_end = slice.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8(slice[..trimmed_end].to_vec())
        .map_err(|e| DbError::Codec(format!("invalid utf-8 in fixed string: {e}")))
}

/// Days since 1970-01-01, packed as a signed 24-bit integer (3 bytes).
pub fn write_date(buf: &mut [u8], days: i32) -> DbResult<()> {
    write_int_be(buf, days as i64, 3)
}

pub fn read_date(buf: &[u8]) -> DbResult<i32> {
    Ok(read_int_be(buf, 3)? as i32)
}

/// Milliseconds since midnight, packed as a signed 40-bit integer (5 bytes).
pub fn write_time(buf: &mut [u8], millis: i64) -> DbResult<()> {
    write_int_be(buf, millis, 5)
}

pub fn read_time(buf: &[u8]) -> DbResult<i64> {
    read_int_be(buf, 5)
}

/// Milliseconds since the epoch, packed as a signed 64-bit integer (8 bytes).
pub fn write_timestamp(buf: &mut [u8], millis: i64) -> DbResult<()> {
    write_int_be(buf, millis, 8)
}

pub fn read_timestamp(buf: &[u8]) -> DbResult<i64> {
    read_int_be(buf, 8)
}

#[cfg(test)]
mod tests;

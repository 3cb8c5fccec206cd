//! Search-key codec: the ordered, self-describing byte encoding the B+-tree
//! index uses for both leaf and separator keys.
//!
//! A key is a sequence of typed atomic values drawn from a closed set, or a
//! composite of atomic values. Each atom is a single-byte discriminator (plus
//! a 16-bit length for strings) followed by its body, so a key never needs an
//! external schema to decode — the bytes carry their own shape.

use codec::{
    read_date, read_f32, read_f64, read_i16, read_i32, read_i64, read_str_fixed, read_time,
    read_timestamp, read_u16, write_date, write_f32, write_f64, write_i16, write_i32, write_i64,
    write_str_fixed, write_time, write_timestamp, write_u16,
};
use common::{DbError, DbResult};
use std::cmp::Ordering;

const TAG_BYTE: u8 = 0;
const TAG_SHORT: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_LONG: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_DOUBLE: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_DATE: u8 = 7;
const TAG_TIME: u8 = 8;
const TAG_TIMESTAMP: u8 = 9;
const TAG_COMPOSITE: u8 = 10;

/// A single atomic key value.
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Days since 1970-01-01.
    Date(i32),
    /// Milliseconds since midnight.
    Time(i64),
    /// Milliseconds since the epoch.
    Timestamp(i64),
}

impl Atom {
    fn tag(&self) -> u8 {
        match self {
            Atom::Byte(_) => TAG_BYTE,
            Atom::Short(_) => TAG_SHORT,
            Atom::Int(_) => TAG_INT,
            Atom::Long(_) => TAG_LONG,
            Atom::Float(_) => TAG_FLOAT,
            Atom::Double(_) => TAG_DOUBLE,
            Atom::Str(_) => TAG_STRING,
            Atom::Date(_) => TAG_DATE,
            Atom::Time(_) => TAG_TIME,
            Atom::Timestamp(_) => TAG_TIMESTAMP,
        }
    }

    fn encoded_len(&self) -> usize {
        let body = match self {
            Atom::Byte(_) => 1,
            Atom::Short(_) => 2,
            Atom::Int(_) | Atom::Float(_) => 4,
            Atom::Date(_) => 3,
            Atom::Time(_) => 5,
            Atom::Long(_) | Atom::Double(_) | Atom::Timestamp(_) => 8,
            Atom::Str(s) => s.len().min(u16::MAX as usize),
        };
        let len_prefix = if matches!(self, Atom::Str(_)) { 2 } else { 0 };
        1 + len_prefix + body
    }

    fn encode(&self, buf: &mut Vec<u8>) -> DbResult<()> {
        buf.push(self.tag());
        match self {
            Atom::Byte(v) => buf.push(*v as u8),
            Atom::Short(v) => {
                let mut tmp = [0u8; 2];
                write_i16(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Int(v) => {
                let mut tmp = [0u8; 4];
                write_i32(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Long(v) => {
                let mut tmp = [0u8; 8];
                write_i64(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Float(v) => {
                let mut tmp = [0u8; 4];
                write_f32(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Double(v) => {
                let mut tmp = [0u8; 8];
                write_f64(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Str(s) => {
                let len = s.len().min(u16::MAX as usize);
                let mut len_buf = [0u8; 2];
                write_u16(&mut len_buf, len as u16)?;
                buf.extend_from_slice(&len_buf);
                let mut body = vec![0u8; len];
                write_str_fixed(&mut body, s, len)?;
                buf.extend_from_slice(&body);
            }
            Atom::Date(v) => {
                let mut tmp = [0u8; 3];
                write_date(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Time(v) => {
                let mut tmp = [0u8; 5];
                write_time(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
            Atom::Timestamp(v) => {
                let mut tmp = [0u8; 8];
                write_timestamp(&mut tmp, *v)?;
                buf.extend_from_slice(&tmp);
            }
        }
        Ok(())
    }

    /// Decodes one atom starting at `buf[0]`, returning it and the number
    /// of bytes consumed.
    fn decode(buf: &[u8]) -> DbResult<(Atom, usize)> {
        if buf.is_empty() {
            return Err(DbError::Codec("empty buffer decoding atom".into()));
        }
        let tag = buf[0];
        let body = &buf[1..];
        match tag {
            TAG_BYTE => Ok((Atom::Byte(body[0] as i8), 2)),
            TAG_SHORT => Ok((Atom::Short(read_i16(body)?), 3)),
            TAG_INT => Ok((Atom::Int(read_i32(body)?), 5)),
            TAG_LONG => Ok((Atom::Long(read_i64(body)?), 9)),
            TAG_FLOAT => Ok((Atom::Float(read_f32(body)?), 5)),
            TAG_DOUBLE => Ok((Atom::Double(read_f64(body)?), 9)),
            TAG_STRING => {
                let len = read_u16(body)? as usize;
                let s = read_str_fixed(&body[2..], len)?;
                Ok((Atom::Str(s), 1 + 2 + len))
            }
            TAG_DATE => Ok((Atom::Date(read_date(body)?), 4)),
            TAG_TIME => Ok((Atom::Time(read_time(body)?), 6)),
            TAG_TIMESTAMP => Ok((Atom::Timestamp(read_timestamp(body)?), 9)),
            other => Err(DbError::Codec(format!("unknown atom tag {other}"))),
        }
    }

    /// Same-type comparison. Float/double use `total_cmp` so NaN orders
    /// greater than every other value and equal to itself, rather than
    /// leaving the comparator partial.
    fn cmp_atom(&self, other: &Atom) -> DbResult<Ordering> {
        match (self, other) {
            (Atom::Byte(a), Atom::Byte(b)) => Ok(a.cmp(b)),
            (Atom::Short(a), Atom::Short(b)) => Ok(a.cmp(b)),
            (Atom::Int(a), Atom::Int(b)) => Ok(a.cmp(b)),
            (Atom::Long(a), Atom::Long(b)) => Ok(a.cmp(b)),
            (Atom::Float(a), Atom::Float(b)) => Ok(a.total_cmp(b)),
            (Atom::Double(a), Atom::Double(b)) => Ok(a.total_cmp(b)),
            (Atom::Str(a), Atom::Str(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Atom::Date(a), Atom::Date(b)) => Ok(a.cmp(b)),
            (Atom::Time(a), Atom::Time(b)) => Ok(a.cmp(b)),
            (Atom::Timestamp(a), Atom::Timestamp(b)) => Ok(a.cmp(b)),
            _ => Err(DbError::InvalidArgument(
                "cannot compare atoms of different types".into(),
            )),
        }
    }
}

/// A key atomic or composite of atomic values, as used in index search.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchKey {
    Atomic(Atom),
    Composite(Vec<Atom>),
}

impl SearchKey {
    pub fn encode(&self) -> DbResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            SearchKey::Atomic(a) => a.encode(&mut buf)?,
            SearchKey::Composite(atoms) => {
                if atoms.len() > u8::MAX as usize {
                    return Err(DbError::InvalidArgument(
                        "composite key has too many fields".into(),
                    ));
                }
                buf.push(TAG_COMPOSITE);
                buf.push(atoms.len() as u8);
                for atom in atoms {
                    atom.encode(&mut buf)?;
                }
            }
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> DbResult<SearchKey> {
        if buf.is_empty() {
            return Err(DbError::Codec("empty buffer decoding search key".into()));
        }
        if buf[0] == TAG_COMPOSITE {
            let count = *buf.get(1).ok_or_else(|| {
                DbError::Codec("truncated composite key: missing count".into())
            })? as usize;
            let mut cursor = 2;
            let mut atoms = Vec::with_capacity(count);
            for _ in 0..count {
                let (atom, consumed) = Atom::decode(&buf[cursor..])?;
                atoms.push(atom);
                cursor += consumed;
            }
            Ok(SearchKey::Composite(atoms))
        } else {
            let (atom, _) = Atom::decode(buf)?;
            Ok(SearchKey::Atomic(atom))
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            SearchKey::Atomic(a) => a.encoded_len(),
            SearchKey::Composite(atoms) => {
                2 + atoms.iter().map(Atom::encoded_len).sum::<usize>()
            }
        }
    }

    fn atoms(&self) -> &[Atom] {
        match self {
            SearchKey::Atomic(a) => std::slice::from_ref(a),
            SearchKey::Composite(atoms) => atoms,
        }
    }

    /// Lexicographic comparison over atomic comparisons; a key that is a
    /// strict prefix of another orders before it.
    pub fn cmp_key(&self, other: &SearchKey) -> DbResult<Ordering> {
        let (a, b) = (self.atoms(), other.atoms());
        for (x, y) in a.iter().zip(b.iter()) {
            let ord = x.cmp_atom(y)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(a.len().cmp(&b.len()))
    }
}

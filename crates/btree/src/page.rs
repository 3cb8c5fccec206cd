//! On-disk layout for a B+-tree node: a single page holds a tag byte, an
//! entry count, and either leaf entries (length-prefixed key + [`RecordId`])
//! or internal separator keys followed by child page IDs.
//!
//! Every key is stored length-prefixed (`u16` byte length) rather than
//! relying on self-describing decode, since [`keycodec::SearchKey::decode`]
//! consumes its whole input slice and gives no "bytes consumed" count to
//! chain multiple keys back to back.

use codec::{read_i32, read_u16, write_i32, write_u16};
use common::{DbError, DbResult, PageId, RecordId};
use keycodec::SearchKey;

use crate::node::BTreeNode;

const TAG_INTERNAL: u8 = 0;
const TAG_LEAF: u8 = 1;
const HEADER_LEN: usize = 3; // tag (1) + count (2)
const LEAF_NEXT_LEN: usize = 4; // next_leaf page id

fn write_key(buf: &mut Vec<u8>, key: &SearchKey) -> DbResult<()> {
    let encoded = key.encode()?;
    if encoded.len() > u16::MAX as usize {
        return Err(DbError::Storage("search key too large to page".into()));
    }
    let mut len_buf = [0u8; 2];
    write_u16(&mut len_buf, encoded.len() as u16)?;
    buf.extend_from_slice(&len_buf);
    buf.extend_from_slice(&encoded);
    Ok(())
}

fn read_key(buf: &[u8], cursor: &mut usize) -> DbResult<SearchKey> {
    let len = read_u16(&buf[*cursor..])? as usize;
    *cursor += 2;
    let key = SearchKey::decode(&buf[*cursor..*cursor + len])?;
    *cursor += len;
    Ok(key)
}

/// Encodes `node` into a fresh `page_size`-byte buffer. Returns
/// [`DbError::Capacity`] if the node's entries do not fit, which the caller
/// should treat as "split this node" rather than a hard failure.
pub fn encode_node(node: &BTreeNode, page_size: usize) -> DbResult<Vec<u8>> {
    let mut body = Vec::new();
    match node {
        BTreeNode::Internal { keys, children } => {
            body.push(TAG_INTERNAL);
            let mut count_buf = [0u8; 2];
            write_u16(&mut count_buf, keys.len() as u16)?;
            body.extend_from_slice(&count_buf);
            for key in keys {
                write_key(&mut body, key)?;
            }
            for child in children {
                let mut tmp = [0u8; 4];
                write_i32(&mut tmp, child.0)?;
                body.extend_from_slice(&tmp);
            }
        }
        BTreeNode::Leaf { entries, next_leaf } => {
            body.push(TAG_LEAF);
            let mut count_buf = [0u8; 2];
            write_u16(&mut count_buf, entries.len() as u16)?;
            body.extend_from_slice(&count_buf);
            let mut next_buf = [0u8; 4];
            write_i32(&mut next_buf, next_leaf.0)?;
            body.extend_from_slice(&next_buf);
            for (key, rid) in entries {
                write_key(&mut body, key)?;
                let mut rid_buf = [0u8; 6];
                write_i32(&mut rid_buf[0..4], rid.page_id.0)?;
                write_u16(&mut rid_buf[4..6], rid.slot)?;
                body.extend_from_slice(&rid_buf);
            }
        }
    }
    if body.len() > page_size {
        return Err(DbError::Capacity(format!(
            "node encodes to {} bytes, page holds {page_size}",
            body.len()
        )));
    }
    body.resize(page_size, 0);
    Ok(body)
}

pub fn decode_node(buf: &[u8]) -> DbResult<BTreeNode> {
    if buf.len() < HEADER_LEN {
        return Err(DbError::Storage("page too small for a btree node".into()));
    }
    let tag = buf[0];
    let count = read_u16(&buf[1..])? as usize;
    let mut cursor = HEADER_LEN;
    match tag {
        TAG_INTERNAL => {
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(read_key(buf, &mut cursor)?);
            }
            let mut children = Vec::with_capacity(count + 1);
            for _ in 0..count + 1 {
                children.push(PageId(read_i32(&buf[cursor..])?));
                cursor += 4;
            }
            Ok(BTreeNode::Internal { keys, children })
        }
        TAG_LEAF => {
            let next_leaf = PageId(read_i32(&buf[cursor..])?);
            cursor += LEAF_NEXT_LEN;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = read_key(buf, &mut cursor)?;
                let page_id = PageId(read_i32(&buf[cursor..])?);
                let slot = read_u16(&buf[cursor + 4..])?;
                cursor += 6;
                entries.push((key, RecordId { page_id, slot }));
            }
            Ok(BTreeNode::Leaf { entries, next_leaf })
        }
        other => Err(DbError::Storage(format!("unknown btree node tag {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycodec::Atom;

    #[test]
    fn leaf_round_trips() {
        let node = BTreeNode::Leaf {
            entries: vec![
                (
                    SearchKey::Atomic(Atom::Int(1)),
                    RecordId { page_id: PageId(3), slot: 0 },
                ),
                (
                    SearchKey::Atomic(Atom::Int(2)),
                    RecordId { page_id: PageId(3), slot: 1 },
                ),
            ],
            next_leaf: PageId(9),
        };
        let bytes = encode_node(&node, 1024).unwrap();
        let decoded = decode_node(&bytes).unwrap();
        match decoded {
            BTreeNode::Leaf { entries, next_leaf } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(next_leaf, PageId(9));
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn internal_round_trips() {
        let node = BTreeNode::Internal {
            keys: vec![SearchKey::Atomic(Atom::Int(10))],
            children: vec![PageId(0), PageId(1)],
        };
        let bytes = encode_node(&node, 1024).unwrap();
        let decoded = decode_node(&bytes).unwrap();
        match decoded {
            BTreeNode::Internal { keys, children } => {
                assert_eq!(keys.len(), 1);
                assert_eq!(children, vec![PageId(0), PageId(1)]);
            }
            _ => panic!("expected internal"),
        }
    }

    #[test]
    fn oversized_node_reports_capacity_error() {
        let entries = (0..500)
            .map(|i| {
                (
                    SearchKey::Atomic(Atom::Str("x".repeat(50))),
                    RecordId { page_id: PageId(0), slot: i as u16 },
                )
            })
            .collect();
        let node = BTreeNode::Leaf { entries, next_leaf: PageId::INVALID };
        let err = encode_node(&node, 1024).unwrap_err();
        assert!(matches!(err, DbError::Capacity(_)));
    }
}

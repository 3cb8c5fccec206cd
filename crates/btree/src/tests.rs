use super::*;
use common::ReplacementPolicyKind;
use keycodec::Atom;
use storage::DiskManager;
use tempfile::tempdir;

fn rid(slot: u16) -> RecordId {
    RecordId { page_id: PageId(0), slot }
}

fn pool(page_size: usize, frames: usize) -> (tempfile::TempDir, BufferManager) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    let disk = DiskManager::create(&path, 4_000, page_size).unwrap();
    (dir, BufferManager::new(disk, frames, ReplacementPolicyKind::Lru))
}

#[test]
fn search_on_empty_index_finds_nothing() {
    let (_dir, mut buf) = pool(1024, 32);
    let index = BTreeIndex::create_index(&mut buf).unwrap();
    let key = SearchKey::Atomic(Atom::Int(1));
    assert_eq!(index.search(&mut buf, &key).unwrap(), None);
    assert_eq!(index.size(&mut buf).unwrap(), 0);
}

#[test]
fn insert_and_search_single_key() {
    let (_dir, mut buf) = pool(1024, 32);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    let key = SearchKey::Atomic(Atom::Int(42));
    index.insert(&mut buf, key.clone(), rid(0)).unwrap();

    assert_eq!(index.search(&mut buf, &key).unwrap(), Some(rid(0)));
    let missing = SearchKey::Atomic(Atom::Int(99));
    assert_eq!(index.search(&mut buf, &missing).unwrap(), None);
}

#[test]
fn insert_ascending_then_search_all() {
    let (_dir, mut buf) = pool(1024, 64);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    for i in 0..200 {
        index
            .insert(&mut buf, SearchKey::Atomic(Atom::Int(i)), rid(i as u16))
            .unwrap();
    }
    for i in 0..200 {
        let found = index.search(&mut buf, &SearchKey::Atomic(Atom::Int(i))).unwrap();
        assert_eq!(found, Some(rid(i as u16)), "key {i} missing");
    }
    index.check_invariants(&mut buf).unwrap();
}

#[test]
fn insert_descending_still_produces_a_valid_tree() {
    let (_dir, mut buf) = pool(1024, 64);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    for i in (0..200).rev() {
        index
            .insert(&mut buf, SearchKey::Atomic(Atom::Int(i)), rid(i as u16))
            .unwrap();
    }
    index.check_invariants(&mut buf).unwrap();
    assert_eq!(index.size(&mut buf).unwrap(), 200);
}

#[test]
fn small_page_size_forces_internal_and_leaf_splits() {
    // A 128-byte page holds only a handful of int entries, so a few hundred
    // inserts force both leaf splits and at least one internal split.
    let (_dir, mut buf) = pool(128, 256);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    for i in 0..600 {
        index
            .insert(&mut buf, SearchKey::Atomic(Atom::Int(i)), rid((i % 65536) as u16))
            .unwrap();
    }
    index.check_invariants(&mut buf).unwrap();
    assert_eq!(index.size(&mut buf).unwrap(), 600);

    let mut scan = index.open_scan(&mut buf).unwrap();
    let mut previous: Option<SearchKey> = None;
    let mut count = 0;
    while let Some((key, _)) = scan.next(&mut buf).unwrap() {
        if let Some(prev) = &previous {
            assert_eq!(prev.cmp_key(&key).unwrap(), Ordering::Less);
        }
        previous = Some(key);
        count += 1;
    }
    assert_eq!(count, 600);
}

#[test]
fn remove_existing_key_then_it_is_gone() {
    let (_dir, mut buf) = pool(1024, 32);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    let key = SearchKey::Atomic(Atom::Int(7));
    index.insert(&mut buf, key.clone(), rid(0)).unwrap();

    assert!(index.remove(&mut buf, &key).unwrap());
    assert_eq!(index.search(&mut buf, &key).unwrap(), None);
    assert_eq!(index.size(&mut buf).unwrap(), 0);
}

#[test]
fn remove_missing_key_returns_false() {
    let (_dir, mut buf) = pool(1024, 32);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    let key = SearchKey::Atomic(Atom::Int(7));
    assert!(!index.remove(&mut buf, &key).unwrap());
}

#[test]
fn string_keys_compare_by_utf8_bytes() {
    let (_dir, mut buf) = pool(1024, 32);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    let names = ["alice", "bob", "charlie", "dave"];
    for (slot, name) in names.iter().enumerate() {
        index
            .insert(
                &mut buf,
                SearchKey::Atomic(Atom::Str(name.to_string())),
                rid(slot as u16),
            )
            .unwrap();
    }
    let found = index
        .search(&mut buf, &SearchKey::Atomic(Atom::Str("charlie".into())))
        .unwrap();
    assert_eq!(found, Some(rid(2)));
}

#[test]
fn composite_keys_search_on_full_tuple() {
    let (_dir, mut buf) = pool(1024, 32);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    let entries = [
        (vec![Atom::Str("eng".into()), Atom::Int(1)], 0u16),
        (vec![Atom::Str("eng".into()), Atom::Int(2)], 1),
        (vec![Atom::Str("sales".into()), Atom::Int(1)], 2),
    ];
    for (atoms, slot) in &entries {
        index
            .insert(&mut buf, SearchKey::Composite(atoms.clone()), rid(*slot))
            .unwrap();
    }
    let found = index
        .search(
            &mut buf,
            &SearchKey::Composite(vec![Atom::Str("eng".into()), Atom::Int(2)]),
        )
        .unwrap();
    assert_eq!(found, Some(rid(1)));
}

#[test]
fn delete_frees_every_page_in_the_index() {
    let (_dir, mut buf) = pool(128, 256);
    let mut index = BTreeIndex::create_index(&mut buf).unwrap();
    for i in 0..300 {
        index
            .insert(&mut buf, SearchKey::Atomic(Atom::Int(i)), rid((i % 65536) as u16))
            .unwrap();
    }
    let alloc_before = buf.disk_mut().get_alloc_count().unwrap();
    index.delete(&mut buf).unwrap();
    let alloc_after = buf.disk_mut().get_alloc_count().unwrap();
    assert!(alloc_after < alloc_before);
}

#[test]
fn reopening_by_root_page_id_sees_the_same_tree() {
    let (_dir, mut buf) = pool(1024, 32);
    let root = {
        let mut index = BTreeIndex::create_index(&mut buf).unwrap();
        for i in 0..20 {
            index
                .insert(&mut buf, SearchKey::Atomic(Atom::Int(i)), rid(i as u16))
                .unwrap();
        }
        index.root_page_id()
    };
    let reopened = BTreeIndex::open_index(root);
    assert_eq!(reopened.size(&mut buf).unwrap(), 20);
    let found = reopened.search(&mut buf, &SearchKey::Atomic(Atom::Int(15))).unwrap();
    assert_eq!(found, Some(rid(15)));
}

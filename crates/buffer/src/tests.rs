use super::*;
use common::ReplacementPolicyKind;
use storage::DiskManager;
use tempfile::tempdir;

fn new_pool(num_frames: usize, policy: ReplacementPolicyKind) -> (tempfile::TempDir, BufferManager) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.db");
    let disk = DiskManager::create(&path, 200_000, 1024).unwrap();
    (dir, BufferManager::new(disk, num_frames, policy))
}

#[test]
fn new_page_fails_when_pool_is_full_of_pinned_pages() {
    let (_dir, mut pool) = new_pool(2, ReplacementPolicyKind::Lru);
    pool.new_page().unwrap();
    pool.new_page().unwrap();
    let err = pool.new_page().unwrap_err();
    assert!(matches!(err, DbError::Capacity(_)));
}

#[test]
fn free_page_requires_pin_count_one() {
    let (_dir, mut pool) = new_pool(4, ReplacementPolicyKind::Lru);
    let (page_id, _) = pool.new_page().unwrap();
    pool.pin_page(page_id).unwrap(); // pin count now 2
    let err = pool.free_page(page_id).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[test]
fn balanced_pin_unpin_returns_pool_to_zero_pinned() {
    let (_dir, mut pool) = new_pool(4, ReplacementPolicyKind::Lru);
    let (page_id, _) = pool.new_page().unwrap();
    pool.unpin_page(page_id, UnpinMode::Clean).unwrap();
    assert_eq!(pool.pinned_frame_count(), 0);
}

#[test]
fn at_most_one_frame_per_page_id() {
    let (_dir, mut pool) = new_pool(4, ReplacementPolicyKind::Lru);
    let (page_id, frame_a) = pool.new_page().unwrap();
    let frame_b = pool.pin_page(page_id).unwrap();
    assert_eq!(frame_a, frame_b);
}

#[test]
fn unpin_without_pin_is_an_error() {
    let (_dir, mut pool) = new_pool(4, ReplacementPolicyKind::Lru);
    let (page_id, _) = pool.new_page().unwrap();
    pool.unpin_page(page_id, UnpinMode::Clean).unwrap();
    let err = pool.unpin_page(page_id, UnpinMode::Clean).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[test]
fn pin_invalid_page_id_is_an_error() {
    let (_dir, mut pool) = new_pool(4, ReplacementPolicyKind::Lru);
    let err = pool.pin_page(PageId::INVALID).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[test]
fn random_and_mru_policies_can_evict() {
    for kind in [ReplacementPolicyKind::Random, ReplacementPolicyKind::Mru] {
        let (_dir, mut pool) = new_pool(2, kind);
        let (p0, _) = pool.new_page().unwrap();
        pool.unpin_page(p0, UnpinMode::Dirty).unwrap();
        let (p1, _) = pool.new_page().unwrap();
        pool.unpin_page(p1, UnpinMode::Dirty).unwrap();
        // Forces an eviction; must not error now that both are unpinned.
        pool.new_page().unwrap();
    }
}

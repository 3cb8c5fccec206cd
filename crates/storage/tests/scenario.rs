//! End-to-end disk-manager scenarios, driven only through `storage`'s
//! public API.

use common::PageId;
use storage::DiskManager;
use tempfile::tempdir;

fn new_manager(num_pages: u64) -> (tempfile::TempDir, DiskManager) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.db");
    let manager = DiskManager::create(&path, num_pages, 1024).unwrap();
    (dir, manager)
}

#[test]
fn bitmap_allocation_reuses_a_freed_run() {
    let (_dir, mut manager) = new_manager(500);
    let run_start = manager.allocate_pages(30).unwrap();
    manager.deallocate_pages(PageId(run_start.0 + 20), 10).unwrap();
    let reused = manager.allocate_pages(10).unwrap();
    assert_eq!(reused.0, run_start.0 + 20);
}

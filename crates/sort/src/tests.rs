use std::rc::Rc;

use proptest::prelude::*;
use rand::prelude::*;

use common::ReplacementPolicyKind;
use storage::DiskManager;
use tempfile::tempdir;

use super::*;
use crate::run::RunReader;

fn pool(page_size: usize, frames: usize, disk_pages: u64) -> (tempfile::TempDir, BufferManager) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sort.db");
    let disk = DiskManager::create(&path, disk_pages, page_size).unwrap();
    (dir, BufferManager::new(disk, frames, ReplacementPolicyKind::Lru))
}

fn int_cmp() -> Comparator {
    Rc::new(|a: &[u8], b: &[u8]| {
        i32::from_be_bytes(a.try_into().unwrap()).cmp(&i32::from_be_bytes(b.try_into().unwrap()))
    })
}

fn read_all(buffer: &mut BufferManager, run: Run) -> Vec<i32> {
    let mut reader = RunReader::open(buffer, run, 4).unwrap();
    let mut out = Vec::new();
    while let Some(rec) = reader.next(buffer).unwrap() {
        out.push(i32::from_be_bytes(rec.try_into().unwrap()));
    }
    out
}

#[test]
fn sorts_a_small_shuffled_input() {
    let (_dir, mut buf) = pool(256, 32, 2_000);
    let sorter = ExternalSort::new(4, 8, 4, int_cmp());
    let input: Vec<i32> = vec![9, 1, 8, 2, 7, 3, 6, 4, 5, 0, -3, 42, 17];
    let mut expected = input.clone();
    expected.sort();

    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    assert_eq!(output.record_count, expected.len() as u64);
    assert_eq!(read_all(&mut buf, output), expected);
}

#[test]
fn output_is_a_permutation_of_the_input() {
    let (_dir, mut buf) = pool(256, 48, 4_000);
    let sorter = ExternalSort::new(4, 16, 4, int_cmp());

    let mut input: Vec<i32> = (0..2_000).collect();
    // Deterministic shuffle: no RNG needed, just a non-trivial permutation.
    input.rotate_left(777);
    for chunk in input.chunks_mut(13) {
        chunk.reverse();
    }

    let mut expected = input.clone();
    expected.sort();

    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    let actual = read_all(&mut buf, output);

    assert_eq!(actual, expected);
    let mut sorted_actual = actual.clone();
    sorted_actual.sort();
    let mut sorted_expected = expected.clone();
    sorted_expected.sort();
    assert_eq!(sorted_actual, sorted_expected, "output must be a multiset-equal permutation");
}

#[test]
fn buffer_pool_has_no_outstanding_pins_after_sort() {
    let (_dir, mut buf) = pool(512, 64, 8_000);
    let sorter = ExternalSort::new(4, 32, 6, int_cmp());
    let input: Vec<i32> = (0..5_000).rev().collect();
    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    assert_eq!(buf.pinned_frame_count(), 0);

    run::free_run(&mut buf, output).unwrap();
    assert_eq!(buf.pinned_frame_count(), 0);
}

#[test]
fn large_input_sorts_correctly_and_frees_intermediate_runs() {
    // A heap much smaller than the input forces several initial runs and
    // at least one multi-pass merge, and checks that the output run's
    // pages get reclaimed afterward.
    let (_dir, mut buf) = pool(512, 96, 40_000);
    let sorter = ExternalSort::new(4, 64, 4, int_cmp());

    let n = 20_000i32;
    let mut input: Vec<i32> = (0..n).collect();
    input.rotate_left(6_173);
    for chunk in input.chunks_mut(97) {
        chunk.reverse();
    }

    let mut expected = input.clone();
    expected.sort();

    let alloc_before = buf.disk_mut().get_alloc_count().unwrap();
    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    let actual = read_all(&mut buf, output);
    assert_eq!(actual, expected);

    let alloc_after = buf.disk_mut().get_alloc_count().unwrap();
    run::free_run(&mut buf, output).unwrap();
    let alloc_final = buf.disk_mut().get_alloc_count().unwrap();
    assert!(alloc_final < alloc_after, "freeing the output run should release its pages");
    let _ = alloc_before;
}

#[test]
fn empty_input_produces_an_empty_run() {
    let (_dir, mut buf) = pool(256, 16, 1_000);
    let sorter = ExternalSort::new(4, 8, 4, int_cmp());
    let output = sorter.sort(&mut buf, std::iter::empty()).unwrap();
    assert_eq!(output.record_count, 0);
    assert_eq!(read_all(&mut buf, output), Vec::<i32>::new());
}

#[test]
fn input_smaller_than_the_heap_needs_no_merge_pass() {
    let (_dir, mut buf) = pool(256, 16, 1_000);
    let sorter = ExternalSort::new(4, 64, 4, int_cmp());
    let input: Vec<i32> = vec![5, -1, 3];
    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    assert_eq!(read_all(&mut buf, output), vec![-1, 3, 5]);
}

proptest! {
    #[test]
    fn sorts_correctly_for_randomly_seeded_shuffles(seed in any::<u64>()) {
        let (_dir, mut buf) = pool(256, 24, 3_000);
        let sorter = ExternalSort::new(4, 10, 4, int_cmp());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut input: Vec<i32> = (0..500).collect();
        input.shuffle(&mut rng);

        let mut expected = input.clone();
        expected.sort();

        let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
        let output = sorter.sort(&mut buf, records).unwrap();
        prop_assert_eq!(read_all(&mut buf, output), expected);
    }
}

#[test]
fn comparator_ordering_is_respected_for_descending_sorts() {
    let (_dir, mut buf) = pool(256, 32, 2_000);
    let descending: Comparator = Rc::new(|a: &[u8], b: &[u8]| {
        let a = i32::from_be_bytes(a.try_into().unwrap());
        let b = i32::from_be_bytes(b.try_into().unwrap());
        b.cmp(&a)
    });
    let sorter = ExternalSort::new(4, 8, 4, descending);
    let input: Vec<i32> = vec![3, 1, 4, 1, 5, 9, 2, 6];
    let mut expected = input.clone();
    expected.sort_by(|a, b| b.cmp(a));

    let records = input.into_iter().map(|v| v.to_be_bytes().to_vec());
    let output = sorter.sort(&mut buf, records).unwrap();
    assert_eq!(read_all(&mut buf, output), expected);
}

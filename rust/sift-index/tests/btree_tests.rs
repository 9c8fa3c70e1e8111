use std::{path::Path, sync::Arc};

use sift_index::btree::{BTree, BTreeBuilder, PostingLocation, TreeMeta};
use sift_testkit::data_gen::spaced_keys;

fn location(key: u32) -> PostingLocation {
    PostingLocation {
        offset: 32 + key as u64 * 7,
        length: key % 13 + 1,
        doc_freq: key % 5 + 1,
    }
}

fn build_tree(dir: &Path, keys: &[u32], block_size: usize) -> TreeMeta {
    let mut builder =
        BTreeBuilder::create(&dir.join("tree.meta"), &dir.join("tree.bin"), block_size).unwrap();
    for &key in keys {
        builder.push(key, location(key)).unwrap();
    }
    builder.finish().unwrap()
}

fn open_tree(dir: &Path, block_size: usize, n_blocks: usize) -> BTree {
    BTree::open(
        &dir.join("tree.meta"),
        &dir.join("tree.bin"),
        block_size,
        n_blocks,
    )
    .unwrap()
}

#[test]
fn test_round_trip_at_many_sizes() {
    for (count, block_size) in [(0, 64), (1, 64), (2, 64), (3, 64), (50, 64), (1000, 64), (5000, 256), (20000, 4096)] {
        let dir = tempfile::tempdir().unwrap();
        let keys = spaced_keys(count, 3);
        let meta = build_tree(dir.path(), &keys, block_size);
        assert_eq!(meta.key_count, count as u64);

        let tree = open_tree(dir.path(), block_size, 4);
        let stats = tree.validate().unwrap();
        assert_eq!(stats.keys, count as u64, "count {count}");
        assert_eq!(stats.height, meta.height);
        assert_eq!(stats.pages, meta.page_count);

        for &key in &keys {
            assert_eq!(tree.lookup(key).unwrap(), Some(location(key)), "key {key}");
            assert_eq!(tree.lookup(key + 1).unwrap(), None);
        }
        assert_eq!(tree.lookup(u32::MAX).unwrap(), None);
    }
}

#[test]
fn test_leaf_occupancy_and_height() {
    let dir = tempfile::tempdir().unwrap();
    // 64-byte pages hold 2 leaf entries and 7 children.
    let keys = spaced_keys(1001, 1);
    let meta = build_tree(dir.path(), &keys, 64);
    let tree = open_tree(dir.path(), 64, 8);
    let stats = tree.validate().unwrap();
    assert_eq!(stats.leaf_pages, 501);
    assert!(stats.min_leaf_entries >= 1);
    assert_eq!(stats.max_leaf_entries, 2);
    // ceil(log7(501)) levels of internal pages above the leaves
    assert_eq!(meta.height, 5);
}

#[test]
fn test_range_scans() {
    let dir = tempfile::tempdir().unwrap();
    let keys = spaced_keys(500, 2);
    build_tree(dir.path(), &keys, 128);
    let tree = open_tree(dir.path(), 128, 3);

    let scan = |r: std::ops::Range<u32>| -> Vec<u32> {
        tree.range(r).unwrap().map(|e| e.unwrap().0).collect()
    };
    assert_eq!(scan(10..17), vec![10, 12, 14, 16]);
    assert_eq!(scan(11..12), Vec::<u32>::new());
    assert_eq!(scan(990..5000), vec![990, 992, 994, 996, 998]);

    let all: Vec<(u32, PostingLocation)> = tree.range(..).unwrap().map(Result::unwrap).collect();
    assert_eq!(all.len(), 500);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(all.iter().all(|(k, loc)| *loc == location(*k)));

    assert_eq!(tree.range(997..=998).unwrap().count(), 1);
    assert_eq!(tree.range(2000..).unwrap().count(), 0);
}

#[test]
fn test_buffer_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let keys = spaced_keys(3000, 1);
    build_tree(dir.path(), &keys, 64);

    // Room for one root-to-leaf path plus a few spare pages: the upper levels
    // stay resident between lookups.
    let tree = open_tree(dir.path(), 64, 8);
    let height = tree.meta().height as u64;
    assert!(height < 8, "height {height}");
    for &key in keys.iter().step_by(7) {
        assert_eq!(tree.lookup(key).unwrap(), Some(location(key)));
    }
    let stats = tree.buffer_stats();
    assert_eq!(stats.capacity, 8);
    assert!(stats.resident <= 8);
    assert!(stats.hits > 0);
    assert!(stats.misses > 0);

    // A repeated lookup is served entirely from the buffer.
    let key = keys[1234];
    tree.lookup(key).unwrap();
    let warm = tree.buffer_stats();
    assert_eq!(tree.lookup(key).unwrap(), Some(location(key)));
    let after = tree.buffer_stats();
    assert_eq!(after.misses, warm.misses);
    assert_eq!(after.hits, warm.hits + height);
    tree.close();

    // A buffer smaller than one path still answers correctly and never grows.
    let tree = open_tree(dir.path(), 64, 2);
    for &key in keys.iter().step_by(97) {
        assert_eq!(tree.lookup(key).unwrap(), Some(location(key)));
    }
    let stats = tree.buffer_stats();
    assert_eq!(stats.resident, 2);
    assert!(stats.misses >= height * keys.iter().step_by(97).count() as u64 - 2);
    tree.close();
}

#[test]
fn test_concurrent_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let keys = spaced_keys(4000, 5);
    build_tree(dir.path(), &keys, 128);
    let tree = Arc::new(open_tree(dir.path(), 128, 6));

    std::thread::scope(|s| {
        for t in 0..8u32 {
            let tree = Arc::clone(&tree);
            let keys = &keys;
            s.spawn(move || {
                let mut rng = fastrand::Rng::with_seed(t as u64);
                for _ in 0..2000 {
                    let key = keys[rng.usize(..keys.len())];
                    assert_eq!(tree.lookup(key).unwrap(), Some(location(key)));
                    assert_eq!(tree.lookup(key + 2).unwrap(), None);
                }
            });
        }
    });
    assert!(tree.buffer_stats().resident <= 6);
    tree.validate().unwrap();
}

#[test]
fn test_open_rejects_block_size_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    build_tree(dir.path(), &spaced_keys(100, 1), 128);
    let err = BTree::open(
        &dir.path().join("tree.meta"),
        &dir.path().join("tree.bin"),
        256,
        4,
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("128"));
}

#[test]
fn test_open_rejects_damaged_files() {
    let dir = tempfile::tempdir().unwrap();
    build_tree(dir.path(), &spaced_keys(100, 1), 128);
    let tree_path = dir.path().join("tree.bin");
    let meta_path = dir.path().join("tree.meta");

    let mut pages = std::fs::read(&tree_path).unwrap();
    pages.truncate(pages.len() - 10);
    std::fs::write(&tree_path, &pages).unwrap();
    let err = BTree::open(&meta_path, &tree_path, 128, 4).err().unwrap();
    assert!(err.to_string().contains("truncated"));

    let mut meta = std::fs::read(&meta_path).unwrap();
    meta[20] ^= 0xff;
    std::fs::write(&meta_path, &meta).unwrap();
    assert!(BTree::open(&meta_path, &tree_path, 128, 4).is_err());

    assert!(BTree::open(&dir.path().join("missing.meta"), &tree_path, 128, 4).is_err());
}

#[test]
fn test_corrupt_page_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    build_tree(dir.path(), &spaced_keys(100, 1), 128);
    let tree_path = dir.path().join("tree.bin");
    let mut pages = std::fs::read(&tree_path).unwrap();
    // a body byte of the first leaf
    pages[40] ^= 0x55;
    std::fs::write(&tree_path, &pages).unwrap();

    let tree = open_tree(dir.path(), 128, 4);
    assert!(tree.lookup(0).is_err());
    assert!(tree.validate().is_err());
}

#[test]
fn test_builder_rejects_unordered_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = BTreeBuilder::create(
        &dir.path().join("tree.meta"),
        &dir.path().join("tree.bin"),
        64,
    )
    .unwrap();
    builder.push(5, location(5)).unwrap();
    assert!(builder.push(5, location(5)).is_err());
    assert!(builder.push(4, location(4)).is_err());
    drop(builder);
    assert!(!dir.path().join("tree.bin").exists());
    assert!(!dir.path().join("tree.meta").exists());
}

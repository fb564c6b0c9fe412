// Skip list iterator tests: sorted traversal, seek, and backward steps over
// the bare list shared by SkipListRep and HashSkipListRep.

mod common;

use std::sync::Arc;

use common::{current, drain, seek_key};
use lsm_memtable::iterator::RepIterator;
use lsm_memtable::memtable::skiplist::{BRANCHING_FACTOR, MAX_HEIGHT, NodeStore, SkipList};
use lsm_memtable::types::{ValueType, encode_entry, encoded_entry_len};
use lsm_memtable::{Arena, InternalKeyComparator};
use rand::seq::SliceRandom;

fn new_list(max_height: usize, branching: u32) -> SkipList {
    SkipList::new(Arc::new(Arena::new()), Arc::new(InternalKeyComparator), max_height, branching)
}

fn insert(list: &SkipList, arena: &Arena, key: &[u8], seq: u64) {
    let mut buf = arena.allocate(encoded_entry_len(key.len(), 1));
    encode_entry(&mut buf, key, seq, ValueType::Put, b"v");
    list.insert(arena.publish(buf));
}

fn keys_forward(list: &SkipList) -> Vec<Vec<u8>> {
    let mut iter = list.iter();
    iter.seek_to_first();
    drain(&mut iter).into_iter().map(|(k, _)| k).collect()
}

// =============================================================================
// Test 1: Empty list
// =============================================================================
// An iterator over an empty skip list is invalid after every kind of seek.
#[test]
fn iterator_empty_skiplist_is_invalid() {
    let list = new_list(MAX_HEIGHT, BRANCHING_FACTOR);
    let mut iter = list.iter();
    assert!(!iter.valid());
    iter.seek_to_first();
    assert!(!iter.valid());
    iter.seek_to_last();
    assert!(!iter.valid());
    assert!(list.is_empty());
}

// =============================================================================
// Test 2: Single entry
// =============================================================================
#[test]
fn iterator_single_entry() {
    let arena = Arc::new(Arena::new());
    let list = SkipList::new(Arc::clone(&arena), Arc::new(InternalKeyComparator), MAX_HEIGHT, BRANCHING_FACTOR);
    insert(&list, &arena, b"key", 1);

    let mut iter = list.iter();
    iter.seek_to_first();
    assert!(iter.valid());
    assert_eq!(current(&iter), (b"key".to_vec(), 1));

    iter.next();
    assert!(!iter.valid());
}

// =============================================================================
// Test 3: Many entries inserted in random order come out sorted
// =============================================================================
// Run once per shape: a plain linked list (height 1), the default, and a
// tall narrow list.
#[test]
fn iterator_returns_sorted_order_for_every_shape() {
    for (height, branching) in [(1, 4), (MAX_HEIGHT, BRANCHING_FACTOR), (20, 2)] {
        let arena = Arc::new(Arena::new());
        let list = SkipList::new(Arc::clone(&arena), Arc::new(InternalKeyComparator), height, branching);

        let mut ids: Vec<u32> = (0..500).collect();
        ids.shuffle(&mut rand::thread_rng());
        for &i in &ids {
            insert(&list, &arena, format!("key_{i:04}").as_bytes(), 1);
        }

        let expected: Vec<Vec<u8>> = (0..500).map(|i| format!("key_{i:04}").into_bytes()).collect();
        assert_eq!(keys_forward(&list), expected, "height {height}, branching {branching}");
        assert_eq!(list.handles().len(), 500);
    }
}

// =============================================================================
// Test 4: Seek to existing / missing / out of range keys
// =============================================================================
#[test]
fn iterator_seek_variants() {
    let arena = Arc::new(Arena::new());
    let list = SkipList::new(Arc::clone(&arena), Arc::new(InternalKeyComparator), MAX_HEIGHT, BRANCHING_FACTOR);
    for k in [b"a", b"c", b"e"] {
        insert(&list, &arena, k, 1);
    }

    let mut iter = list.iter();
    iter.seek(&seek_key(b"c"));
    assert_eq!(current(&iter).0, b"c");

    // "b" doesn't exist, should land on "c"
    iter.seek(&seek_key(b"b"));
    assert_eq!(current(&iter).0, b"c");

    iter.seek(&seek_key(b"0"));
    assert_eq!(current(&iter).0, b"a");

    iter.seek(&seek_key(b"z"));
    assert!(!iter.valid());
}

// =============================================================================
// Test 5: prev from the middle and from the front
// =============================================================================
#[test]
fn iterator_prev_steps_back() {
    let arena = Arc::new(Arena::new());
    let list = SkipList::new(Arc::clone(&arena), Arc::new(InternalKeyComparator), MAX_HEIGHT, BRANCHING_FACTOR);
    for k in [b"a", b"b", b"c", b"d"] {
        insert(&list, &arena, k, 1);
    }

    let mut iter = list.iter();
    iter.seek(&seek_key(b"c"));
    iter.prev();
    assert_eq!(current(&iter).0, b"b");
    iter.prev();
    assert_eq!(current(&iter).0, b"a");
    iter.prev();
    assert!(!iter.valid());

    iter.seek_to_last();
    assert_eq!(current(&iter).0, b"d");
}

// =============================================================================
// Test 6: Lists sharing one node store stay independent
// =============================================================================
#[test]
fn lists_on_shared_node_store_do_not_mix() {
    let arena = Arc::new(Arena::new());
    let nodes = Arc::new(NodeStore::new());
    let make = || {
        SkipList::with_node_store(
            Arc::clone(&arena),
            Arc::new(InternalKeyComparator),
            Arc::clone(&nodes),
            4,
            4,
        )
    };
    let left = make();
    let right = make();

    for i in 0..50u32 {
        insert(&left, &arena, format!("l{i:02}").as_bytes(), 1);
        insert(&right, &arena, format!("r{i:02}").as_bytes(), 1);
    }

    assert!(keys_forward(&left).iter().all(|k| k[0] == b'l'));
    assert!(keys_forward(&right).iter().all(|k| k[0] == b'r'));
    assert_eq!(nodes.len(), 100);
}

// =============================================================================
// Test 7: Height outside the supported range is rejected
// =============================================================================
#[test]
#[should_panic(expected = "height")]
fn zero_height_panics() {
    let _ = new_list(0, 4);
}

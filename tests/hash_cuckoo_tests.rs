// HashCuckooRep: cuckoo hashing with a skip-list overflow.

mod common;

use std::sync::Arc;

use common::{assert_duplicate_rejected, create_rep, get_all, get_value, init_tracing, put};
use lsm_memtable::memtable::hash_cuckoo::MAX_CUCKOO_PATH_DEPTH;
use lsm_memtable::memtable::{HashCuckooOptions, HashCuckooRep, HashCuckooRepFactory};
use lsm_memtable::types::{InternalKey, ParsedEntry, ValueType};
use lsm_memtable::{Arena, InternalKeyComparator, MemTableRep};

fn new_rep(write_buffer_size: usize) -> HashCuckooRep {
    init_tracing();
    let options = HashCuckooOptions::new(write_buffer_size);
    HashCuckooRep::new(
        Arc::new(InternalKeyComparator),
        Arc::new(Arena::new()),
        options.bucket_count(),
        options.hash_function_count,
    )
}

fn key(i: usize) -> Vec<u8> {
    format!("user{i:04}").into_bytes()
}

/// Insert distinct keys until the table overflows. Returns how many went in.
fn fill_until_read_only(rep: &HashCuckooRep) -> usize {
    let mut inserted = 0;
    while !rep.is_read_only() {
        assert!(inserted <= rep.bucket_count(), "table never overflowed");
        put(rep, &key(inserted), inserted as u64 + 1, b"value");
        inserted += 1;
    }
    inserted
}

// =============================================================================
// Test 1: Overflow spills to the backup and freezes the table
// =============================================================================
#[test]
fn overflow_goes_to_backup_and_turns_read_only() {
    let rep = new_rep(1024);
    assert!(!rep.has_backup());

    let inserted = fill_until_read_only(&rep);

    assert!(rep.has_backup());
    assert!(rep.is_read_only());
    assert!(inserted > rep.bucket_count() / 2, "only {inserted} of {} slots used", rep.bucket_count());
    assert!(rep.longest_kickout_chain() <= MAX_CUCKOO_PATH_DEPTH);

    // every key, including the one in the backup, is still readable
    for i in 0..inserted {
        assert_eq!(get_value(&rep, &key(i), 1_000), Some(b"value".to_vec()), "key {i}");
        let ikey = InternalKey::new(key(i), i as u64 + 1, ValueType::Put).encode();
        assert!(rep.contains(&ikey), "key {i}");
    }
}

// =============================================================================
// Test 2: Inserting after the overflow is a fault
// =============================================================================
#[test]
#[should_panic(expected = "read-only")]
fn insert_after_overflow_panics() {
    let rep = new_rep(1024);
    fill_until_read_only(&rep);
    put(&rep, b"late", 10_000, b"v");
}

// =============================================================================
// Test 3: A newer version replaces the stored one
// =============================================================================
#[test]
fn newer_version_replaces_older() {
    let rep = new_rep(4096);
    put(&rep, b"k", 1, b"old");
    put(&rep, b"k", 2, b"new");

    assert_eq!(get_value(&rep, b"k", 10), Some(b"new".to_vec()));
    assert!(rep.contains(&InternalKey::new(b"k".to_vec(), 2, ValueType::Put).encode()));
    assert!(!rep.contains(&InternalKey::new(b"k".to_vec(), 1, ValueType::Put).encode()));

    rep.mark_read_only();
    assert_eq!(rep.entries_for_flush().len(), 1);
}

// =============================================================================
// Test 4: Get visits exactly one entry
// =============================================================================
#[test]
fn get_visits_single_candidate() {
    let rep = new_rep(4096);
    put(&rep, b"a", 1, b"1");
    put(&rep, b"b", 2, b"2");

    let visited = get_all(&rep, b"a", 100, usize::MAX);
    assert_eq!(visited, vec![(b"a".to_vec(), 1, b"1".to_vec())]);
    assert!(get_all(&rep, b"missing", 100, usize::MAX).is_empty());
}

// =============================================================================
// Test 5: Flush view is sorted and covers the backup
// =============================================================================
#[test]
fn entries_for_flush_are_sorted_and_complete() {
    let rep = new_rep(1024);
    let inserted = fill_until_read_only(&rep);

    let entries = rep.entries_for_flush();
    assert_eq!(entries.len(), inserted);
    let keys: Vec<Vec<u8>> = entries
        .iter()
        .map(|e| ParsedEntry::decode(e).unwrap().user_key.to_vec())
        .collect();
    let expected: Vec<Vec<u8>> = (0..inserted).map(key).collect();
    assert_eq!(keys, expected);
}

// =============================================================================
// Test 6: Flush view requires read-only
// =============================================================================
#[test]
#[should_panic(expected = "read-only")]
fn entries_for_flush_before_read_only_panics() {
    let rep = new_rep(1024);
    put(&rep, b"a", 1, b"v");
    let _ = rep.entries_for_flush();
}

// =============================================================================
// Test 7: No ordered iteration
// =============================================================================
#[test]
#[should_panic(expected = "not supported")]
fn iterator_panics() {
    let rep = new_rep(1024);
    let _ = rep.iter();
}

#[test]
#[should_panic(expected = "not supported")]
fn prefix_iterator_panics() {
    let rep = new_rep(1024);
    let _ = rep.dynamic_prefix_iter();
}

// =============================================================================
// Test 8: Capability flags and factory wiring
// =============================================================================
#[test]
fn created_by_factory_without_snapshot_support() {
    let factory = HashCuckooRepFactory::new(HashCuckooOptions::new(1024)).unwrap();
    let rep = create_rep(&factory, None);

    assert_eq!(rep.name(), "HashCuckooRep");
    assert!(!rep.is_snapshot_supported());
    assert!(!rep.is_merge_operator_supported());

    put(&*rep, b"k", 1, b"v");
    assert_eq!(get_value(&*rep, b"k", 1), Some(b"v".to_vec()));
}

// =============================================================================
// Test 9: Reinserting the identical internal key is a fault
// =============================================================================
#[test]
#[should_panic(expected = "duplicate key")]
fn duplicate_insert_panics() {
    let rep = new_rep(4096);
    put(&rep, b"k", 1, b"v");
    put(&rep, b"k", 1, b"v");
}

// =============================================================================
// Test 10: A rejected duplicate leaves the arena as it was
// =============================================================================
#[test]
fn rejected_duplicate_does_not_grow_arena() {
    let rep = new_rep(4096);
    put(&rep, b"k", 1, b"v");
    assert_duplicate_rejected(&rep, b"k", 1);
    assert_eq!(get_value(&rep, b"k", 1), Some(b"v".to_vec()));
}

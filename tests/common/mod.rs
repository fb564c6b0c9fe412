// Shared helpers for the representation integration tests.
#![allow(dead_code)]

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use lsm_memtable::iterator::RepIterator;
use lsm_memtable::types::{LookupKey, MAX_SEQUENCE_NUMBER, ParsedEntry};
use lsm_memtable::{
    Arena, InternalKeyComparator, KeyComparator, KeyHandle, MemTableRep, MemTableRepFactory,
    SequenceNumber, SliceTransform, ValueType, add_entry,
};
use tracing_subscriber::EnvFilter;

/// Route crate logs to the test output. Filter with RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_rep(
    factory: &dyn MemTableRepFactory,
    transform: Option<Arc<dyn SliceTransform>>,
) -> Box<dyn MemTableRep> {
    init_tracing();
    factory
        .create_memtable_rep(Arc::new(InternalKeyComparator), Arc::new(Arena::new()), transform)
        .unwrap()
}

pub fn put(rep: &dyn MemTableRep, user_key: &[u8], sequence: SequenceNumber, value: &[u8]) -> KeyHandle {
    add_entry(rep, user_key, sequence, ValueType::Put, value)
}

pub fn delete(rep: &dyn MemTableRep, user_key: &[u8], sequence: SequenceNumber) -> KeyHandle {
    add_entry(rep, user_key, sequence, ValueType::Delete, b"")
}

/// Seek target landing on the newest version of `user_key`.
pub fn seek_key(user_key: &[u8]) -> Vec<u8> {
    LookupKey::new(user_key, MAX_SEQUENCE_NUMBER).internal_key().to_vec()
}

/// (user key, sequence) of the entry under the cursor.
pub fn current(iter: &dyn RepIterator) -> (Vec<u8>, SequenceNumber) {
    let entry = ParsedEntry::decode(iter.key()).unwrap();
    (entry.user_key.to_vec(), entry.sequence)
}

/// Walk forward from the current position until the iterator runs out.
pub fn drain(iter: &mut dyn RepIterator) -> Vec<(Vec<u8>, SequenceNumber)> {
    let mut out = Vec::new();
    while iter.valid() {
        out.push(current(iter));
        iter.next();
    }
    out
}

/// User keys of every entry, in full iteration order.
pub fn user_keys(rep: &dyn MemTableRep) -> Vec<Vec<u8>> {
    let mut iter = rep.iter();
    iter.seek_to_first();
    drain(iter.as_mut()).into_iter().map(|(k, _)| k).collect()
}

/// Every entry `get` visits for this lookup, stopping when `limit` is reached.
pub fn get_all(rep: &dyn MemTableRep, user_key: &[u8], sequence: SequenceNumber, limit: usize) -> Vec<(Vec<u8>, SequenceNumber, Vec<u8>)> {
    let lookup = LookupKey::new(user_key, sequence);
    let mut seen = Vec::new();
    rep.get(&lookup, &mut |entry: &[u8]| {
        let e = ParsedEntry::decode(entry).unwrap();
        seen.push((e.user_key.to_vec(), e.sequence, e.value.to_vec()));
        seen.len() < limit
    });
    seen
}

/// Value visible for `user_key` at `sequence`: the first visited entry, if
/// it belongs to that user key.
pub fn get_value(rep: &dyn MemTableRep, user_key: &[u8], sequence: SequenceNumber) -> Option<Vec<u8>> {
    get_all(rep, user_key, sequence, 1)
        .into_iter()
        .next()
        .filter(|(k, _, _)| k == user_key)
        .map(|(_, _, v)| v)
}

/// Re-insert an entry that is already present. The rep must panic, leave
/// the arena untouched, and keep accepting new entries afterwards.
pub fn assert_duplicate_rejected(rep: &dyn MemTableRep, user_key: &[u8], sequence: SequenceNumber) {
    let arena_len = rep.arena().len();
    let arena_bytes = rep.arena().memory_usage();

    let payload = panic::catch_unwind(AssertUnwindSafe(|| put(rep, user_key, sequence, b"again")))
        .expect_err("duplicate insert was accepted");
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or_default();
    assert!(message.contains("duplicate key"), "unexpected panic: {message}");

    assert_eq!(rep.arena().len(), arena_len);
    assert_eq!(rep.arena().memory_usage(), arena_bytes);

    put(rep, b"zz-after-duplicate", sequence + 1, b"ok");
    assert_eq!(get_value(rep, b"zz-after-duplicate", sequence + 1), Some(b"ok".to_vec()));
}

/// Internal key comparator that counts how often it is consulted.
#[derive(Default)]
pub struct CountingComparator {
    calls: AtomicUsize,
}

impl CountingComparator {
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }
}

impl KeyComparator for CountingComparator {
    fn name(&self) -> &'static str {
        "test.CountingComparator"
    }

    fn compare_internal_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        InternalKeyComparator.compare_internal_keys(a, b)
    }
}

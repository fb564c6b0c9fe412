//! Write buffer representations.
//!
//! A `MemTableRep` is the sorted collection behind an active write buffer.
//! Properties every representation shares:
//!   1. It never stores two entries that compare equal.
//!   2. It orders entries with the `KeyComparator` it was created with.
//!   3. One writer inserts while any number of readers look up and iterate
//!      without locks or coordination.
//!   4. Entries are never removed. A delete is just another entry.
//!
//! Five strategies are provided, each built by its own factory:
//!   - `SkipListRep`: the default.
//!   - `VectorRep`: unsorted appends, sorted once on first read.
//!   - `HashSkipListRep`: prefix-hashed buckets of skip lists.
//!   - `HashLinkListRep`: prefix-hashed buckets of sorted linked lists.
//!   - `HashCuckooRep`: cuckoo hashing, point lookups only.

pub mod factory;
pub mod hash_cuckoo;
pub mod hash_linklist;
pub mod hash_skiplist;
pub mod skiplist;
pub mod skiplist_rep;
pub mod vector;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::arena::{Arena, EntryBuf, KeyHandle};
use crate::iterator::RepIterator;
use crate::types::{LookupKey, SequenceNumber, ValueType, encode_entry, encoded_entry_len};

pub use factory::{
    HashCuckooOptions, HashCuckooRepFactory, HashLinkListOptions, HashLinkListRepFactory,
    HashSkipListOptions, HashSkipListRepFactory, MemTableRepFactory, SkipListFactory,
    VectorRepFactory,
};
pub use hash_cuckoo::HashCuckooRep;
pub use hash_linklist::HashLinkListRep;
pub use hash_skiplist::HashSkipListRep;
pub use skiplist_rep::SkipListRep;
pub use vector::VectorRep;

/// The collection backing one write buffer.
///
/// Mutating calls (`allocate`, `insert`, `mark_read_only`) come from a
/// single writer. Everything else may run on any thread at any time.
pub trait MemTableRep: Send + Sync {
    /// Strategy name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Arena that owns this rep's entries.
    fn arena(&self) -> &Arena;

    /// Reserve `len` bytes for an entry the caller is about to encode.
    fn allocate(&self, len: usize) -> EntryBuf {
        self.arena().allocate(len)
    }

    /// Publish an entry and link it into the structure.
    ///
    /// # Panics
    /// Panics after `mark_read_only`, or when two writers insert at once.
    /// Representations that can detect it for free also panic on an entry
    /// comparing equal to one already present.
    fn insert(&self, entry: EntryBuf);

    /// Returns true iff an entry with exactly this internal key is present.
    fn contains(&self, internal_key: &[u8]) -> bool;

    /// One-way switch to read-only. Later calls are ignored.
    fn mark_read_only(&self);

    fn is_read_only(&self) -> bool;

    /// Visit entries starting at the newest version of `key.user_key()` whose
    /// sequence is <= `key.sequence()`, in order, until `visit` returns
    /// false or the rep runs out of candidates.
    ///
    /// Every real match is visited. Entries for other user keys may be
    /// visited too; where the scan stops is up to the representation.
    fn get(&self, key: &LookupKey, visit: &mut dyn FnMut(&[u8]) -> bool) {
        let mut iter = self.iter_for_user_key(key.user_key());
        iter.seek(key.internal_key());
        while iter.valid() && visit(iter.key()) {
            iter.next();
        }
    }

    /// Memory held outside the arena's own accounting (links, buckets).
    fn approximate_memory_usage(&self) -> usize;

    /// Iterator over every entry in comparator order.
    fn iter(&self) -> Box<dyn RepIterator + '_>;

    /// Iterator covering at least the entries of `user_key`.
    fn iter_for_user_key(&self, _user_key: &[u8]) -> Box<dyn RepIterator + '_> {
        self.iter()
    }

    /// Iterator whose `seek` may only return entries sharing the target's prefix.
    fn dynamic_prefix_iter(&self) -> Box<dyn RepIterator + '_> {
        self.iter()
    }

    fn is_merge_operator_supported(&self) -> bool {
        true
    }

    fn is_snapshot_supported(&self) -> bool {
        true
    }
}

/// Encode an entry into a freshly allocated buffer and insert it.
pub fn add_entry(
    rep: &(impl MemTableRep + ?Sized),
    user_key: &[u8],
    sequence: SequenceNumber,
    value_type: ValueType,
    value: &[u8],
) -> KeyHandle {
    let mut buf = rep.allocate(encoded_entry_len(user_key.len(), value.len()));
    encode_entry(&mut buf, user_key, sequence, value_type, value);
    let handle = buf.handle();
    rep.insert(buf);
    handle
}

/// Enforces the single-writer and read-only rules for `insert`.
#[derive(Debug, Default)]
pub(crate) struct WriteGate {
    read_only: AtomicBool,
    writer_active: AtomicBool,
}

impl WriteGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Begin an insert. The returned guard ends it.
    pub(crate) fn enter(&self, rep: &'static str) -> WriteGuard<'_> {
        assert!(
            !self.read_only.load(Ordering::Acquire),
            "{rep}: insert after the rep became read-only"
        );
        assert!(
            !self.writer_active.swap(true, Ordering::Acquire),
            "{rep}: concurrent insert from a second writer"
        );
        WriteGuard { gate: self }
    }

    /// Returns true if this call performed the transition.
    pub(crate) fn mark_read_only(&self, rep: &'static str) -> bool {
        let first = !self.read_only.swap(true, Ordering::AcqRel);
        if first {
            debug!(rep, "memtable rep is now read-only");
        } else {
            debug!(rep, "rep already read-only, ignoring mark_read_only");
        }
        first
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }
}

pub(crate) struct WriteGuard<'a> {
    gate: &'a WriteGate,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.gate.writer_active.store(false, Ordering::Release);
    }
}

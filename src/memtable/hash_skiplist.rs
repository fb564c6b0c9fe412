use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use xxhash_rust::xxh3::xxh3_64;

use crate::arena::{Arena, EntryBuf};
use crate::comparator::KeyComparator;
use crate::iterator::merge::merge_sorted_runs;
use crate::iterator::prefix::DynamicPrefixIterator;
use crate::iterator::{EmptyIterator, RepIterator, SortedIterator};
use crate::memtable::skiplist::{NodeStore, SkipList};
use crate::memtable::{MemTableRep, WriteGate};
use crate::transform::SliceTransform;
use crate::types::{entry_user_key, extract_user_key};

/// A fixed array of buckets, each lazily holding its own skip list.
///
/// ```text
///   bucket = xxh3(prefix(user_key)) % bucket_count
///
///   [0] ─► (empty)
///   [1] ─► SkipList { "app:1", "app:2", "app:7" }
///   [2] ─► (empty)
///   [3] ─► SkipList { "cat:0", "dog:3" }        (hash collision)
/// ```
///
/// Best for keys shaped like "prefix:suffix" where scans stay inside one
/// prefix. Insert and search cost O(log m) for a bucket of m entries. A
/// full scan has to merge every bucket, so `iter()` takes a snapshot of
/// the entries present when it is created.
pub struct HashSkipListRep {
    arena: Arc<Arena>,
    cmp: Arc<dyn KeyComparator>,
    transform: Arc<dyn SliceTransform>,
    buckets: Box<[OnceLock<Box<SkipList>>]>,
    nodes: Arc<NodeStore>,
    skiplist_height: usize,
    branching: u32,
    gate: WriteGate,
    bucket_bytes: AtomicUsize,
}

impl HashSkipListRep {
    pub const NAME: &'static str = "HashSkipListRep";

    pub fn new(
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        transform: Arc<dyn SliceTransform>,
        bucket_count: usize,
        skiplist_height: usize,
        branching: u32,
    ) -> Self {
        HashSkipListRep {
            arena,
            cmp,
            transform,
            buckets: (0..bucket_count).map(|_| OnceLock::new()).collect(),
            nodes: Arc::new(NodeStore::new()),
            skiplist_height,
            branching,
            gate: WriteGate::new(),
            bucket_bytes: AtomicUsize::new(0),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, user_key: &[u8]) -> usize {
        (xxh3_64(self.transform.prefix_of(user_key)) % self.buckets.len() as u64) as usize
    }

    fn bucket(&self, user_key: &[u8]) -> Option<&SkipList> {
        self.buckets[self.bucket_index(user_key)].get().map(|list| &**list)
    }
}

impl MemTableRep for HashSkipListRep {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    /// # Panics
    /// Panics if an entry comparing equal is already in the bucket. The
    /// rejected entry is not published.
    fn insert(&self, entry: EntryBuf) {
        let _writer = self.gate.enter(Self::NAME);
        let slot = &self.buckets[self.bucket_index(entry_user_key(&entry))];

        let mut bytes = 0;
        let list = slot.get_or_init(|| {
            bytes += mem::size_of::<SkipList>() + self.skiplist_height * mem::size_of::<u32>();
            Box::new(SkipList::with_node_store(
                Arc::clone(&self.arena),
                Arc::clone(&self.cmp),
                Arc::clone(&self.nodes),
                self.skiplist_height,
                self.branching,
            ))
        });
        let splice = list.splice_for(&entry);
        let handle = self.arena.publish(entry);
        bytes += list.insert_at(splice, handle);
        self.bucket_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn contains(&self, internal_key: &[u8]) -> bool {
        self.bucket(extract_user_key(internal_key))
            .is_some_and(|list| list.contains(internal_key))
    }

    fn mark_read_only(&self) {
        self.gate.mark_read_only(Self::NAME);
    }

    fn is_read_only(&self) -> bool {
        self.gate.is_read_only()
    }

    fn approximate_memory_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.buckets.len() * mem::size_of::<OnceLock<Box<SkipList>>>()
            + self.nodes.allocated_bytes()
            + self.bucket_bytes.load(Ordering::Relaxed)
    }

    fn iter(&self) -> Box<dyn RepIterator + '_> {
        let runs = self
            .buckets
            .iter()
            .filter_map(OnceLock::get)
            .map(|list| list.handles())
            .collect();
        let merged = merge_sorted_runs(runs, &self.arena, &*self.cmp);
        Box::new(SortedIterator::new(&self.arena, &*self.cmp, Arc::new(merged)))
    }

    fn iter_for_user_key(&self, user_key: &[u8]) -> Box<dyn RepIterator + '_> {
        match self.bucket(user_key) {
            Some(list) => Box::new(list.iter()),
            None => Box::new(EmptyIterator),
        }
    }

    fn dynamic_prefix_iter(&self) -> Box<dyn RepIterator + '_> {
        Box::new(DynamicPrefixIterator::new(&*self.transform, |user_key: &[u8]| {
            self.bucket(user_key).map(SkipList::iter)
        }))
    }
}

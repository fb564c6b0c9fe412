use std::cmp::Ordering as CmpOrdering;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::arena::{Arena, ChunkedVec, EntryBuf, KeyHandle};
use crate::comparator::KeyComparator;
use crate::iterator::merge::merge_sorted_runs;
use crate::iterator::prefix::DynamicPrefixIterator;
use crate::iterator::{EmptyIterator, INVALID_ITERATOR, RepIterator, SortedIterator};
use crate::memtable::{MemTableRep, WriteGate};
use crate::transform::SliceTransform;
use crate::types::{entry_user_key, extract_user_key};

const NIL: u32 = u32::MAX;

struct LinkNode {
    handle: KeyHandle,
    next: AtomicU32,
}

/// A fixed array of buckets, each holding a sorted singly-linked list.
///
/// Same bucketing as `HashSkipListRep`, but a node costs one link instead
/// of a tower, and a bucket head is a single `u32`. Insert and search walk
/// the bucket, O(m) for m entries, so this suits many small prefixes or
/// tight memory budgets.
///
/// A new node is fully built (handle and next link) before the
/// predecessor's link is swung to it with `Release`; readers follow links
/// with `Acquire`.
pub struct HashLinkListRep {
    arena: Arc<Arena>,
    cmp: Arc<dyn KeyComparator>,
    transform: Arc<dyn SliceTransform>,
    buckets: Box<[AtomicU32]>,
    nodes: ChunkedVec<LinkNode>,
    gate: WriteGate,
}

impl HashLinkListRep {
    pub const NAME: &'static str = "HashLinkListRep";

    /// `huge_page_tlb_size > 0` asks for the bucket array on huge pages.
    /// Huge pages are never mapped here: the array always holds exactly
    /// `bucket_count` heads on the heap, and the fallback is logged.
    pub fn new(
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        transform: Arc<dyn SliceTransform>,
        bucket_count: usize,
        huge_page_tlb_size: usize,
    ) -> Self {
        if huge_page_tlb_size > 0 {
            warn!(
                huge_page_tlb_size,
                bucket_bytes = bucket_count * mem::size_of::<AtomicU32>(),
                "huge page TLB mapping unavailable, bucket array allocated from the heap"
            );
        }

        HashLinkListRep {
            arena,
            cmp,
            transform,
            buckets: (0..bucket_count).map(|_| AtomicU32::new(NIL)).collect(),
            nodes: ChunkedVec::new(),
            gate: WriteGate::new(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, user_key: &[u8]) -> usize {
        (xxh3_64(self.transform.prefix_of(user_key)) % self.buckets.len() as u64) as usize
    }

    fn node(&self, idx: u32) -> &LinkNode {
        match self.nodes.get(idx) {
            Some(node) => node,
            None => panic!("link list points at unpublished node {idx}"),
        }
    }

    fn entry(&self, idx: u32) -> &[u8] {
        self.arena.get(self.node(idx).handle)
    }

    fn next(&self, idx: u32) -> u32 {
        self.node(idx).next.load(Ordering::Acquire)
    }

    fn head(&self, bucket: usize) -> u32 {
        self.buckets[bucket].load(Ordering::Acquire)
    }

    /// First node in `bucket` whose entry is >= the target, or NIL.
    fn seek_in_bucket(&self, bucket: usize, target_cmp: impl Fn(&[u8]) -> CmpOrdering) -> u32 {
        let mut x = self.head(bucket);
        while x != NIL && target_cmp(self.entry(x)).is_lt() {
            x = self.next(x);
        }
        x
    }

    fn bucket_iter(&self, user_key: &[u8]) -> Option<LinkListIterator<'_>> {
        let bucket = self.bucket_index(user_key);
        (self.head(bucket) != NIL).then(|| LinkListIterator {
            rep: self,
            bucket,
            node: NIL,
        })
    }

    fn bucket_handles(&self, bucket: usize) -> Vec<KeyHandle> {
        let mut out = Vec::new();
        let mut x = self.head(bucket);
        while x != NIL {
            out.push(self.node(x).handle);
            x = self.next(x);
        }
        out
    }
}

impl MemTableRep for HashLinkListRep {
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
        let bucket = self.bucket_index(entry_user_key(&entry));

        let mut prev = NIL;
        let mut cur = self.head(bucket);
        while cur != NIL {
            match self.cmp.compare(self.entry(cur), &entry) {
                CmpOrdering::Less => {
                    prev = cur;
                    cur = self.next(cur);
                }
                CmpOrdering::Equal => panic!("duplicate key inserted into link list bucket"),
                CmpOrdering::Greater => break,
            }
        }

        let handle = self.arena.publish(entry);
        let idx = self.nodes.push(LinkNode {
            handle,
            next: AtomicU32::new(cur),
        });
        let link = if prev == NIL {
            &self.buckets[bucket]
        } else {
            &self.node(prev).next
        };
        link.store(idx, Ordering::Release);
    }

    fn contains(&self, internal_key: &[u8]) -> bool {
        let bucket = self.bucket_index(extract_user_key(internal_key));
        let x = self.seek_in_bucket(bucket, |e| self.cmp.compare_key(e, internal_key));
        x != NIL && self.cmp.compare_key(self.entry(x), internal_key) == CmpOrdering::Equal
    }

    fn mark_read_only(&self) {
        self.gate.mark_read_only(Self::NAME);
    }

    fn is_read_only(&self) -> bool {
        self.gate.is_read_only()
    }

    fn approximate_memory_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.buckets.len() * mem::size_of::<AtomicU32>()
            + self.nodes.allocated_bytes()
    }

    fn iter(&self) -> Box<dyn RepIterator + '_> {
        let runs = (0..self.buckets.len())
            .filter(|&b| self.head(b) != NIL)
            .map(|b| self.bucket_handles(b))
            .collect();
        let merged = merge_sorted_runs(runs, &self.arena, &*self.cmp);
        Box::new(SortedIterator::new(&self.arena, &*self.cmp, Arc::new(merged)))
    }

    fn iter_for_user_key(&self, user_key: &[u8]) -> Box<dyn RepIterator + '_> {
        match self.bucket_iter(user_key) {
            Some(iter) => Box::new(iter),
            None => Box::new(EmptyIterator),
        }
    }

    fn dynamic_prefix_iter(&self) -> Box<dyn RepIterator + '_> {
        Box::new(DynamicPrefixIterator::new(&*self.transform, |user_key: &[u8]| {
            self.bucket_iter(user_key)
        }))
    }
}

/// Cursor over one bucket. `prev` rescans the bucket from its head.
pub struct LinkListIterator<'a> {
    rep: &'a HashLinkListRep,
    bucket: usize,
    node: u32,
}

impl LinkListIterator<'_> {
    fn current(&self) -> u32 {
        assert!(self.node != NIL, "{INVALID_ITERATOR}");
        self.node
    }
}

impl RepIterator for LinkListIterator<'_> {
    fn valid(&self) -> bool {
        self.node != NIL
    }

    fn key(&self) -> &[u8] {
        self.rep.entry(self.current())
    }

    fn next(&mut self) {
        self.node = self.rep.next(self.current());
    }

    fn prev(&mut self) {
        let target = self.current();
        let mut prev = NIL;
        let mut x = self.rep.head(self.bucket);
        while x != target {
            prev = x;
            x = self.rep.next(x);
        }
        self.node = prev;
    }

    fn seek(&mut self, internal_key: &[u8]) {
        let rep = self.rep;
        self.node = rep.seek_in_bucket(self.bucket, |e| rep.cmp.compare_key(e, internal_key));
    }

    fn seek_to_first(&mut self) {
        self.node = self.rep.head(self.bucket);
    }

    fn seek_to_last(&mut self) {
        let mut x = self.rep.head(self.bucket);
        while x != NIL {
            let next = self.rep.next(x);
            if next == NIL {
                break;
            }
            x = next;
        }
        self.node = x;
    }
}

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::arena::{Arena, EntryBuf, KeyHandle};
use crate::comparator::KeyComparator;
use crate::iterator::RepIterator;
use crate::memtable::skiplist::{BRANCHING_FACTOR, MAX_HEIGHT, NodeStore, SkipList};
use crate::memtable::{MemTableRep, WriteGate};

/// The default representation: one skip list over every entry.
///
/// Average case: O(log n) insert, O(log n) lookup, O(n) iteration, in the
/// exact comparator order. No tuning knobs.
pub struct SkipListRep {
    arena: Arc<Arena>,
    nodes: Arc<NodeStore>,
    list: SkipList,
    gate: WriteGate,
    link_bytes: AtomicUsize,
}

impl SkipListRep {
    pub const NAME: &'static str = "SkipListRep";

    pub fn new(cmp: Arc<dyn KeyComparator>, arena: Arc<Arena>) -> Self {
        let nodes = Arc::new(NodeStore::new());
        let list = SkipList::with_node_store(
            Arc::clone(&arena),
            cmp,
            Arc::clone(&nodes),
            MAX_HEIGHT,
            BRANCHING_FACTOR,
        );
        SkipListRep {
            arena,
            nodes,
            list,
            gate: WriteGate::new(),
            link_bytes: AtomicUsize::new(0),
        }
    }

    /// Link an entry that is already published in the arena.
    pub(crate) fn insert_published(&self, handle: KeyHandle) {
        let _writer = self.gate.enter(Self::NAME);
        self.link(handle);
    }

    fn link(&self, handle: KeyHandle) {
        let bytes = self.list.insert(handle);
        self.link_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Every linked handle, in comparator order.
    pub(crate) fn handles(&self) -> Vec<KeyHandle> {
        self.list.handles()
    }
}

impl MemTableRep for SkipListRep {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    /// # Panics
    /// Panics if an entry comparing equal is already present. The rejected
    /// entry is not published, so the arena does not grow.
    fn insert(&self, entry: EntryBuf) {
        let _writer = self.gate.enter(Self::NAME);
        let splice = self.list.splice_for(&entry);
        let handle = self.arena.publish(entry);
        let bytes = self.list.insert_at(splice, handle);
        self.link_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn contains(&self, internal_key: &[u8]) -> bool {
        self.list.contains(internal_key)
    }

    fn mark_read_only(&self) {
        self.gate.mark_read_only(Self::NAME);
    }

    fn is_read_only(&self) -> bool {
        self.gate.is_read_only()
    }

    fn approximate_memory_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.nodes.allocated_bytes()
            + self.link_bytes.load(Ordering::Relaxed)
    }

    fn iter(&self) -> Box<dyn RepIterator + '_> {
        Box::new(self.list.iter())
    }
}

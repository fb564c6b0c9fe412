use std::cmp::Ordering as CmpOrdering;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use rand::Rng;
use tracing::trace;

use crate::arena::{Arena, ChunkedVec, KeyHandle};
use crate::comparator::KeyComparator;
use crate::iterator::{INVALID_ITERATOR, RepIterator};

/// Maximum height of the default skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// Default probabilistic ratio between adjacent levels (LevelDB uses 1/4).
pub const BRANCHING_FACTOR: u32 = 4;

/// Hard cap on any configured height.
pub const HEIGHT_LIMIT: usize = 32;

/// Empty link. As a "node" argument it stands for the head sentinel.
const NIL: u32 = u32::MAX;

/// A single node in the skip list.
///
/// Each node has `height` forward links. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
///
/// Links are indices into a `NodeStore` rather than pointers. The entry
/// bytes stay in the arena; the node only carries the handle.
pub struct SkipNode {
    handle: KeyHandle,
    next: Box<[AtomicU32]>,
}

/// Insertion point of one entry: its predecessor node at every level.
pub struct Splice {
    prev: [u32; HEIGHT_LIMIT],
}

/// Node storage. Several lists can share one store (one per hash bucket).
pub type NodeStore = ChunkedVec<SkipNode>;

/// A concurrent skip list of arena handles.
///
/// Publication protocol for the single writer:
///   1. The insertion point is found from the unpublished bytes, so a
///      duplicate is rejected before anything reaches the arena. Then the
///      entry is published.
///   2. The new node's own links are filled in, then the node is pushed
///      into the node store.
///   3. Predecessor links are swung to the new node with `Release`,
///      bottom level first.
///
/// Readers load links with `Acquire`, so any node they reach is fully
/// built and so is its entry. No node is ever unlinked.
pub struct SkipList {
    arena: Arc<Arena>,
    cmp: Arc<dyn KeyComparator>,
    nodes: Arc<NodeStore>,
    head: Box<[AtomicU32]>,
    max_height: usize,
    branching: u32,
    /// Current max level in use. Readers may see a stale value; that only
    /// costs them a few extra steps since unused head links are NIL.
    height: AtomicUsize,
}

impl SkipList {
    /// Create an empty list with its own node store.
    pub fn new(
        arena: Arc<Arena>,
        cmp: Arc<dyn KeyComparator>,
        max_height: usize,
        branching: u32,
    ) -> Self {
        Self::with_node_store(arena, cmp, Arc::new(NodeStore::new()), max_height, branching)
    }

    /// Create an empty list whose nodes live in a shared store.
    pub fn with_node_store(
        arena: Arc<Arena>,
        cmp: Arc<dyn KeyComparator>,
        nodes: Arc<NodeStore>,
        max_height: usize,
        branching: u32,
    ) -> Self {
        assert!(
            (1..=HEIGHT_LIMIT).contains(&max_height),
            "skip list height must be in 1..={HEIGHT_LIMIT}"
        );
        assert!(branching >= 2, "skip list branching factor must be >= 2");
        SkipList {
            arena,
            cmp,
            nodes,
            head: (0..max_height).map(|_| AtomicU32::new(NIL)).collect(),
            max_height,
            branching,
            height: AtomicUsize::new(1),
        }
    }

    /// Link a published handle into the list. Returns the heap bytes taken
    /// by the new node's link array.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Generate a random height for the new node
    ///   3. Build the node and push it into the store
    ///   4. Splice it in at each level up to its height
    ///
    /// # Panics
    /// Panics if an entry comparing equal is already present.
    pub fn insert(&self, handle: KeyHandle) -> usize {
        let splice = self.splice_for(self.arena.get(handle));
        self.insert_at(splice, handle)
    }

    /// Predecessors of `entry` at every level, found before the entry is
    /// published. Valid until the next insert into this list.
    ///
    /// # Panics
    /// Panics if an entry comparing equal is already present.
    pub fn splice_for(&self, entry: &[u8]) -> Splice {
        let mut prev = [NIL; HEIGHT_LIMIT];
        let found = self.seek_node(|e| self.cmp.compare(e, entry), Some(&mut prev));
        assert!(
            found == NIL || self.cmp.compare(self.entry(found), entry) != CmpOrdering::Equal,
            "duplicate key inserted into skip list"
        );
        Splice { prev }
    }

    /// Link `handle` at a splice taken for its entry bytes.
    pub fn insert_at(&self, splice: Splice, handle: KeyHandle) -> usize {
        let prev = splice.prev;
        let height = self.random_height();
        let current = self.height.load(Ordering::Relaxed);
        if height > current {
            // prev[current..height] already point at the head
            trace!(from = current, to = height, "skip list grew taller");
            self.height.store(height, Ordering::Relaxed);
        }

        let next: Box<[AtomicU32]> = (0..height)
            .map(|level| AtomicU32::new(self.link(prev[level], level).load(Ordering::Relaxed)))
            .collect();
        let idx = self.nodes.push(SkipNode { handle, next });

        for (level, &p) in prev.iter().enumerate().take(height) {
            self.link(p, level).store(idx, Ordering::Release);
        }

        height * mem::size_of::<AtomicU32>()
    }

    /// Returns true iff an entry with exactly this internal key is present.
    pub fn contains(&self, internal_key: &[u8]) -> bool {
        let x = self.seek_node(|e| self.cmp.compare_key(e, internal_key), None);
        x != NIL && self.cmp.compare_key(self.entry(x), internal_key) == CmpOrdering::Equal
    }

    pub fn is_empty(&self) -> bool {
        self.head[0].load(Ordering::Acquire) == NIL
    }

    /// Iterator over this list. Not positioned until a seek.
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator {
            list: self,
            node: NIL,
        }
    }

    /// Every handle on level 0, in order.
    pub fn handles(&self) -> Vec<KeyHandle> {
        let mut out = Vec::new();
        let mut x = self.head[0].load(Ordering::Acquire);
        while x != NIL {
            let node = self.node(x);
            out.push(node.handle);
            x = node.next[0].load(Ordering::Acquire);
        }
        out
    }

    /// Generate a random level for a new node: each extra level has a
    /// 1/branching probability.
    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < self.max_height && rng.gen_range(0..self.branching) == 0 {
            height += 1;
        }
        height
    }

    fn node(&self, idx: u32) -> &SkipNode {
        match self.nodes.get(idx) {
            Some(node) => node,
            None => panic!("skip list link to unpublished node {idx}"),
        }
    }

    fn entry(&self, idx: u32) -> &[u8] {
        self.arena.get(self.node(idx).handle)
    }

    /// Link at `level` leaving `node` (NIL = head).
    fn link(&self, node: u32, level: usize) -> &AtomicU32 {
        if node == NIL {
            &self.head[level]
        } else {
            &self.node(node).next[level]
        }
    }

    fn next(&self, node: u32, level: usize) -> u32 {
        self.link(node, level).load(Ordering::Acquire)
    }

    /// First node whose entry is >= the target, or NIL.
    ///
    /// `target_cmp(entry)` orders an entry relative to the target. When
    /// `prev` is given it receives the last node < target on every level.
    fn seek_node(
        &self,
        target_cmp: impl Fn(&[u8]) -> CmpOrdering,
        mut prev: Option<&mut [u32; HEIGHT_LIMIT]>,
    ) -> u32 {
        let mut x = NIL;
        let mut level = self.height.load(Ordering::Relaxed) - 1;
        loop {
            let next = self.next(x, level);
            if next != NIL && target_cmp(self.entry(next)).is_lt() {
                x = next;
            } else {
                if let Some(prev) = prev.as_deref_mut() {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Last node whose entry is < the target, or NIL (the head).
    fn seek_before(&self, target_cmp: impl Fn(&[u8]) -> CmpOrdering) -> u32 {
        let mut x = NIL;
        let mut level = self.height.load(Ordering::Relaxed) - 1;
        loop {
            let next = self.next(x, level);
            if next != NIL && target_cmp(self.entry(next)).is_lt() {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    /// Last node in the list, or NIL when empty.
    fn last(&self) -> u32 {
        let mut x = NIL;
        let mut level = self.height.load(Ordering::Relaxed) - 1;
        loop {
            let next = self.next(x, level);
            if next != NIL {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }
}

/// Iterator over skip list entries in sorted order.
///
/// Forward steps follow level 0 links. Backward steps re-search from the
/// head for the last node before the current one (O(log n)), so nodes
/// need no back pointers.
pub struct SkipListIterator<'a> {
    list: &'a SkipList,
    node: u32,
}

impl SkipListIterator<'_> {
    fn current(&self) -> u32 {
        assert!(self.node != NIL, "{INVALID_ITERATOR}");
        self.node
    }
}

impl RepIterator for SkipListIterator<'_> {
    fn valid(&self) -> bool {
        self.node != NIL
    }

    fn key(&self) -> &[u8] {
        self.list.entry(self.current())
    }

    fn next(&mut self) {
        self.node = self.list.next(self.current(), 0);
    }

    fn prev(&mut self) {
        let list = self.list;
        let current = list.entry(self.current());
        self.node = list.seek_before(|e| list.cmp.compare(e, current));
    }

    fn seek(&mut self, internal_key: &[u8]) {
        let list = self.list;
        self.node = list.seek_node(|e| list.cmp.compare_key(e, internal_key), None);
    }

    fn seek_to_first(&mut self) {
        self.node = self.list.next(NIL, 0);
    }

    fn seek_to_last(&mut self) {
        self.node = self.list.last();
    }
}

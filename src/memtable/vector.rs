use std::mem;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::debug;

use crate::arena::{Arena, EntryBuf, KeyHandle};
use crate::comparator::KeyComparator;
use crate::iterator::{RepIterator, SortedIterator};
use crate::memtable::{MemTableRep, WriteGate};

/// Unsorted append buffer, sorted once when reading starts.
///
/// Inserts are O(1) pushes. The first read (`contains`, `get`, any
/// iterator) or `mark_read_only`, whichever comes first, sorts the
/// entries into a shared snapshot; every later read reuses it.
///
/// Built for write-heavy buffers that are rarely read before flush.
/// Writing after the sort is not supported: `insert` panics once the
/// entries have been sorted, even if `mark_read_only` was never called.
/// Duplicate entries are not detected.
pub struct VectorRep {
    arena: Arc<Arena>,
    cmp: Arc<dyn KeyComparator>,
    state: RwLock<VectorState>,
    gate: WriteGate,
}

struct VectorState {
    unsorted: Vec<KeyHandle>,
    sorted: Option<Arc<Vec<KeyHandle>>>,
}

impl VectorRep {
    pub const NAME: &'static str = "VectorRep";

    /// `count` pre-reserves room for that many entries.
    pub fn new(cmp: Arc<dyn KeyComparator>, arena: Arc<Arena>, count: usize) -> Self {
        VectorRep {
            arena,
            cmp,
            state: RwLock::new(VectorState {
                unsorted: Vec::with_capacity(count),
                sorted: None,
            }),
            gate: WriteGate::new(),
        }
    }

    /// The sorted snapshot, sorting on first use.
    fn sorted(&self) -> Arc<Vec<KeyHandle>> {
        if let Some(sorted) = &self.state.read().sorted {
            return Arc::clone(sorted);
        }

        let state = self.state.upgradable_read();
        // another reader may have sorted while we waited
        if let Some(sorted) = &state.sorted {
            return Arc::clone(sorted);
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);

        let mut handles = mem::take(&mut state.unsorted);
        handles.sort_unstable_by(|&a, &b| self.cmp.compare(self.arena.get(a), self.arena.get(b)));
        debug!(entries = handles.len(), "vector rep sorted");

        let sorted = Arc::new(handles);
        state.sorted = Some(Arc::clone(&sorted));
        sorted
    }
}

impl MemTableRep for VectorRep {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    fn insert(&self, entry: EntryBuf) {
        let _writer = self.gate.enter(Self::NAME);
        let mut state = self.state.write();
        assert!(
            state.sorted.is_none(),
            "{}: insert after the entries were sorted for reading",
            Self::NAME
        );
        let handle = self.arena.publish(entry);
        state.unsorted.push(handle);
    }

    fn contains(&self, internal_key: &[u8]) -> bool {
        let sorted = self.sorted();
        sorted
            .binary_search_by(|&h| self.cmp.compare_key(self.arena.get(h), internal_key))
            .is_ok()
    }

    fn mark_read_only(&self) {
        if self.gate.mark_read_only(Self::NAME) {
            self.sorted();
        }
    }

    fn is_read_only(&self) -> bool {
        self.gate.is_read_only()
    }

    fn approximate_memory_usage(&self) -> usize {
        let state = self.state.read();
        let handles = state.unsorted.capacity() + state.sorted.as_ref().map_or(0, |s| s.capacity());
        mem::size_of::<Self>() + handles * mem::size_of::<KeyHandle>()
    }

    fn iter(&self) -> Box<dyn RepIterator + '_> {
        Box::new(SortedIterator::new(&self.arena, &*self.cmp, self.sorted()))
    }
}

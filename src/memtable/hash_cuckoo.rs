use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashSet, VecDeque};
use std::mem;
use std::hint;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering, fence};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::arena::{Arena, EntryBuf, KeyHandle};
use crate::comparator::KeyComparator;
use crate::iterator::RepIterator;
use crate::memtable::skiplist_rep::SkipListRep;
use crate::memtable::{MemTableRep, WriteGate};
use crate::types::{LookupKey, entry_user_key, extract_user_key};

/// Longest displacement chain tried before giving up on the table.
pub const MAX_CUCKOO_PATH_DEPTH: usize = 10;

const EMPTY: u32 = u32::MAX;

/// Cuckoo hash table keyed by user key, with a skip-list overflow.
///
/// Each user key has `hash_function_count` candidate slots. Insert takes the
/// candidate already holding the same user key (replacing the older
/// version), else the first empty one, else displaces occupants along the
/// shortest chain ending in an empty slot.
///
/// When no chain of at most `MAX_CUCKOO_PATH_DEPTH` displacements exists,
/// the entry goes to a backup skip list and the rep turns itself
/// read-only so the owner flushes it.
///
/// Relocation moves a key into its new slot before its old slot is
/// overwritten, but a reader probing the candidates one by one can still
/// pass the new slot before the move and the old one after it. Every
/// relocation therefore runs inside a seqlock-style `displacements`
/// window (odd while moving), and a lookup that misses retries until it
/// missed across a window that was closed and unchanged.
///
/// Point lookups only: keeps just the newest version of each user key, so
/// it supports neither snapshots nor merge operands, and it has no ordered
/// iterator. A flush reads it through `entries_for_flush`.
pub struct HashCuckooRep {
    arena: Arc<Arena>,
    cmp: Arc<dyn KeyComparator>,
    table: Box<[AtomicU32]>,
    hash_function_count: usize,
    backup: OnceLock<SkipListRep>,
    gate: WriteGate,
    longest_chain: AtomicUsize,
    displacements: AtomicU64,
}

struct PathStep {
    slot: usize,
    parent: Option<usize>,
    depth: usize,
}

impl HashCuckooRep {
    pub const NAME: &'static str = "HashCuckooRep";

    pub fn new(
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        bucket_count: usize,
        hash_function_count: usize,
    ) -> Self {
        debug!(bucket_count, hash_function_count, "creating cuckoo table");
        HashCuckooRep {
            arena,
            cmp,
            table: (0..bucket_count).map(|_| AtomicU32::new(EMPTY)).collect(),
            hash_function_count,
            backup: OnceLock::new(),
            gate: WriteGate::new(),
            longest_chain: AtomicUsize::new(0),
            displacements: AtomicU64::new(0),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.table.len()
    }

    /// True once an insert overflowed into the backup skip list.
    pub fn has_backup(&self) -> bool {
        self.backup.get().is_some()
    }

    /// Most keys displaced by a single insert so far.
    pub fn longest_kickout_chain(&self) -> usize {
        self.longest_chain.load(Ordering::Relaxed)
    }

    /// Every entry (table and backup) in comparator order.
    ///
    /// # Panics
    /// Panics unless the rep is read-only.
    pub fn entries_for_flush(&self) -> Vec<&[u8]> {
        assert!(
            self.is_read_only(),
            "{}: entries_for_flush before the rep became read-only",
            Self::NAME
        );
        let mut entries: Vec<&[u8]> = self
            .table
            .iter()
            .filter_map(|slot| self.slot_entry(slot))
            .collect();
        if let Some(backup) = self.backup.get() {
            entries.extend(backup.handles().into_iter().map(|h| self.arena.get(h)));
        }
        entries.sort_unstable_by(|a, b| self.cmp.compare(a, b));
        entries
    }

    fn candidates<'a>(&'a self, user_key: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        let buckets = self.table.len() as u64;
        (0..self.hash_function_count as u64)
            .map(move |seed| (xxh3_64_with_seed(user_key, seed) % buckets) as usize)
    }

    fn slot_entry(&self, slot: &AtomicU32) -> Option<&[u8]> {
        match slot.load(Ordering::Acquire) {
            EMPTY => None,
            idx => Some(self.arena.get(KeyHandle::from_index(idx))),
        }
    }

    /// Run a table probe until it hits, or until it misses with no
    /// relocation overlapping it.
    fn probe_stable<T>(&self, probe: impl Fn() -> Option<T>) -> Option<T> {
        loop {
            let before = self.displacements.load(Ordering::Acquire);
            if let Some(found) = probe() {
                return Some(found);
            }
            fence(Ordering::Acquire);
            if before % 2 == 0 && self.displacements.load(Ordering::Relaxed) == before {
                return None;
            }
            hint::spin_loop();
        }
    }

    /// The candidate slot whose entry has `user_key`, if any.
    fn find_user_key(&self, user_key: &[u8]) -> Option<&[u8]> {
        self.probe_stable(|| {
            self.candidates(user_key)
                .filter_map(|slot| self.slot_entry(&self.table[slot]))
                .find(|entry| entry_user_key(entry) == user_key)
        })
    }

    /// Place `handle` in the table. Returns false if it does not fit.
    fn insert_into_table(&self, handle: KeyHandle) -> bool {
        let entry = self.arena.get(handle);
        let user_key = entry_user_key(entry);
        let candidates: Vec<usize> = self.candidates(user_key).collect();

        for &slot in &candidates {
            if self
                .slot_entry(&self.table[slot])
                .is_some_and(|existing| entry_user_key(existing) == user_key)
            {
                self.table[slot].store(handle.index(), Ordering::Release);
                return true;
            }
        }

        if let Some(&slot) = candidates
            .iter()
            .find(|&&slot| self.table[slot].load(Ordering::Relaxed) == EMPTY)
        {
            self.table[slot].store(handle.index(), Ordering::Release);
            return true;
        }

        self.kick_out(&candidates, handle)
    }

    /// Breadth-first search for the shortest displacement chain that ends
    /// in an empty slot, then shift every key one step along it.
    ///
    /// Moves run from the empty end back to the new key's slot, writing
    /// each key to its new slot before its old slot is overwritten, so at
    /// every instant each key occupies at least one of its candidates.
    fn kick_out(&self, candidates: &[usize], handle: KeyHandle) -> bool {
        let mut steps: Vec<PathStep> = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        for &slot in candidates {
            if visited.insert(slot) {
                queue.push_back(steps.len());
                steps.push(PathStep {
                    slot,
                    parent: None,
                    depth: 1,
                });
            }
        }

        while let Some(at) = queue.pop_front() {
            let (slot, depth) = (steps[at].slot, steps[at].depth);
            let Some(occupant) = self.slot_entry(&self.table[slot]) else {
                continue;
            };

            for next in self.candidates(entry_user_key(occupant)) {
                if next == slot {
                    continue;
                }
                if self.table[next].load(Ordering::Relaxed) == EMPTY {
                    self.shift_along(&steps, at, next, handle);
                    self.longest_chain.fetch_max(depth, Ordering::Relaxed);
                    return true;
                }
                if depth < MAX_CUCKOO_PATH_DEPTH && visited.insert(next) {
                    queue.push_back(steps.len());
                    steps.push(PathStep {
                        slot: next,
                        parent: Some(at),
                        depth: depth + 1,
                    });
                }
            }
        }
        false
    }

    fn shift_along(&self, steps: &[PathStep], last: usize, empty: usize, handle: KeyHandle) {
        // only the writer changes the counter
        let version = self.displacements.load(Ordering::Relaxed);
        self.displacements.store(version + 1, Ordering::Relaxed);
        fence(Ordering::Release);

        let mut target = empty;
        let mut step = Some(last);
        while let Some(at) = step {
            let from = steps[at].slot;
            let moved = self.table[from].load(Ordering::Relaxed);
            self.table[target].store(moved, Ordering::Release);
            target = from;
            step = steps[at].parent;
        }
        self.table[target].store(handle.index(), Ordering::Release);
        self.displacements.store(version + 2, Ordering::Release);
    }
}

impl MemTableRep for HashCuckooRep {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    /// # Panics
    /// Panics on an entry equal to the stored version of its user key. The
    /// rejected entry is not published.
    fn insert(&self, entry: EntryBuf) {
        let _writer = self.gate.enter(Self::NAME);
        if let Some(existing) = self.find_user_key(entry_user_key(&entry)) {
            assert!(
                self.cmp.compare(existing, &entry) != CmpOrdering::Equal,
                "duplicate key inserted into cuckoo table"
            );
        }
        let handle = self.arena.publish(entry);
        if self.insert_into_table(handle) {
            return;
        }

        warn!(
            buckets = self.table.len(),
            max_depth = MAX_CUCKOO_PATH_DEPTH,
            "cuckoo table full, spilling to backup skip list and turning read-only"
        );
        let backup = self
            .backup
            .get_or_init(|| SkipListRep::new(Arc::clone(&self.cmp), Arc::clone(&self.arena)));
        backup.insert_published(handle);
        backup.mark_read_only();
        self.gate.mark_read_only(Self::NAME);
    }

    fn contains(&self, internal_key: &[u8]) -> bool {
        let user_key = extract_user_key(internal_key);
        let in_table = self
            .probe_stable(|| {
                self.candidates(user_key)
                    .any(|slot| {
                        self.slot_entry(&self.table[slot])
                            .is_some_and(|e| self.cmp.compare_key(e, internal_key) == CmpOrdering::Equal)
                    })
                    .then_some(())
            })
            .is_some();
        in_table || self.backup.get().is_some_and(|b| b.contains(internal_key))
    }

    fn mark_read_only(&self) {
        if self.gate.mark_read_only(Self::NAME) {
            if let Some(backup) = self.backup.get() {
                backup.mark_read_only();
            }
        }
    }

    fn is_read_only(&self) -> bool {
        self.gate.is_read_only()
    }

    /// Visits the stored version of the user key once, whatever its
    /// sequence; falls back to the backup when the table has none.
    fn get(&self, key: &LookupKey, visit: &mut dyn FnMut(&[u8]) -> bool) {
        if let Some(entry) = self.find_user_key(key.user_key()) {
            visit(entry);
            return;
        }
        if let Some(backup) = self.backup.get() {
            backup.get(key, visit);
        }
    }

    fn approximate_memory_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.table.len() * mem::size_of::<AtomicU32>()
            + self.backup.get().map_or(0, |b| b.approximate_memory_usage())
    }

    fn iter(&self) -> Box<dyn RepIterator + '_> {
        panic!("{}: ordered iteration is not supported", Self::NAME)
    }

    fn iter_for_user_key(&self, _user_key: &[u8]) -> Box<dyn RepIterator + '_> {
        panic!("{}: ordered iteration is not supported", Self::NAME)
    }

    fn dynamic_prefix_iter(&self) -> Box<dyn RepIterator + '_> {
        panic!("{}: ordered iteration is not supported", Self::NAME)
    }

    fn is_merge_operator_supported(&self) -> bool {
        false
    }

    fn is_snapshot_supported(&self) -> bool {
        false
    }
}

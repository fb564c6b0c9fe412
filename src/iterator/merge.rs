use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::arena::{Arena, KeyHandle};
use crate::comparator::KeyComparator;

/// Merges per-bucket sorted runs into one comparator-ordered run.
///
/// K-way merge using a BinaryHeap holding the head of every run, the same
/// algorithm as external merge sort: O(n log k) for n entries in k runs.
/// Runs never share a key (the rep holds no duplicates), so no
/// deduplication is needed.
pub fn merge_sorted_runs(
    runs: Vec<Vec<KeyHandle>>,
    arena: &Arena,
    cmp: &dyn KeyComparator,
) -> Vec<KeyHandle> {
    let total = runs.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);

    let mut heap: BinaryHeap<HeapItem<'_>> = runs
        .iter()
        .enumerate()
        .filter(|(_, run)| !run.is_empty())
        .map(|(run, handles)| HeapItem {
            entry: arena.get(handles[0]),
            run,
            pos: 0,
            cmp,
        })
        .collect();

    while let Some(item) = heap.pop() {
        let handles = &runs[item.run];
        merged.push(handles[item.pos]);

        let pos = item.pos + 1;
        if pos < handles.len() {
            heap.push(HeapItem {
                entry: arena.get(handles[pos]),
                pos,
                ..item
            });
        }
    }
    merged
}

struct HeapItem<'a> {
    entry: &'a [u8],
    run: usize,
    pos: usize,
    cmp: &'a dyn KeyComparator,
}

impl Ord for HeapItem<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest entry on top.
        self.cmp
            .compare(other.entry, self.entry)
            .then_with(|| other.run.cmp(&self.run))
    }
}

impl PartialOrd for HeapItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::InternalKeyComparator;
    use crate::types::{ValueType, encode_entry, encoded_entry_len};

    fn put(arena: &Arena, key: &str) -> KeyHandle {
        let mut buf = arena.allocate(encoded_entry_len(key.len(), 0));
        encode_entry(&mut buf, key.as_bytes(), 1, ValueType::Put, b"");
        arena.publish(buf)
    }

    #[test]
    fn merges_interleaved_runs() {
        let arena = Arena::new();
        let runs = vec![
            vec![put(&arena, "a"), put(&arena, "d"), put(&arena, "g")],
            vec![],
            vec![put(&arena, "b"), put(&arena, "e")],
            vec![put(&arena, "c"), put(&arena, "f"), put(&arena, "h")],
        ];
        let merged = merge_sorted_runs(runs, &arena, &InternalKeyComparator);
        let keys: Vec<_> = merged
            .iter()
            .map(|&h| crate::types::entry_user_key(arena.get(h)).to_vec())
            .collect();
        assert_eq!(
            keys,
            ["a", "b", "c", "d", "e", "f", "g", "h"].map(|k| k.as_bytes().to_vec())
        );
    }
}

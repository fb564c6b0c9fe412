pub mod merge;
pub mod prefix;

use std::sync::Arc;

use crate::arena::{Arena, KeyHandle};
use crate::comparator::KeyComparator;

/// Bidirectional cursor over a representation's entries.
///
/// Every representation returns one of these for range scans. A fresh
/// iterator is not positioned; call one of the seek methods first.
///
/// `key`, `next` and `prev` require `valid()`. Calling them on an invalid
/// iterator is a caller bug and panics.
pub trait RepIterator {
    /// Returns true if the iterator is positioned at an entry.
    fn valid(&self) -> bool;

    /// The encoded entry at the current position.
    fn key(&self) -> &[u8];

    /// Advances to the next entry.
    fn next(&mut self);

    /// Moves back to the previous entry.
    fn prev(&mut self);

    /// Positions the iterator at the first entry >= `internal_key`.
    fn seek(&mut self, internal_key: &[u8]);

    /// Positions at the first entry. Invalid iff there are none.
    fn seek_to_first(&mut self);

    /// Positions at the last entry. Invalid iff there are none.
    fn seek_to_last(&mut self);
}

/// Panic message shared by every iterator's precondition checks.
pub(crate) const INVALID_ITERATOR: &str = "iterator is not positioned at an entry";

/// Iterator over nothing. Handed out for empty buckets.
#[derive(Debug, Default)]
pub struct EmptyIterator;

impl RepIterator for EmptyIterator {
    fn valid(&self) -> bool {
        false
    }

    fn key(&self) -> &[u8] {
        panic!("{INVALID_ITERATOR}")
    }

    fn next(&mut self) {
        panic!("{INVALID_ITERATOR}")
    }

    fn prev(&mut self) {
        panic!("{INVALID_ITERATOR}")
    }

    fn seek(&mut self, _internal_key: &[u8]) {}

    fn seek_to_first(&mut self) {}

    fn seek_to_last(&mut self) {}
}

/// Iterates a vector of handles already sorted by the comparator.
///
/// Used by the vector rep (sharing its sorted snapshot) and by full-order
/// scans over hash-bucketed reps (owning a merged snapshot).
pub struct SortedIterator<'a> {
    arena: &'a Arena,
    cmp: &'a dyn KeyComparator,
    handles: Arc<Vec<KeyHandle>>,
    pos: Option<usize>,
}

impl<'a> SortedIterator<'a> {
    pub fn new(arena: &'a Arena, cmp: &'a dyn KeyComparator, handles: Arc<Vec<KeyHandle>>) -> Self {
        SortedIterator {
            arena,
            cmp,
            handles,
            pos: None,
        }
    }

    fn current(&self) -> usize {
        match self.pos {
            Some(pos) => pos,
            None => panic!("{INVALID_ITERATOR}"),
        }
    }
}

impl RepIterator for SortedIterator<'_> {
    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> &[u8] {
        self.arena.get(self.handles[self.current()])
    }

    fn next(&mut self) {
        let next = self.current() + 1;
        self.pos = (next < self.handles.len()).then_some(next);
    }

    fn prev(&mut self) {
        self.pos = self.current().checked_sub(1);
    }

    fn seek(&mut self, internal_key: &[u8]) {
        let idx = self.handles.partition_point(|&h| {
            self.cmp.compare_key(self.arena.get(h), internal_key).is_lt()
        });
        self.pos = (idx < self.handles.len()).then_some(idx);
    }

    fn seek_to_first(&mut self) {
        self.pos = (!self.handles.is_empty()).then_some(0);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.handles.len().checked_sub(1);
    }
}

//! Append-only entry storage shared by every representation.
//!
//! Design decision: representations never hold pointers into entry bytes.
//! They hold `KeyHandle`s, which are indices into the arena's
//! `ChunkedVec`. Handles stay valid until the arena itself is dropped, and
//! the arena is only dropped after every rep (and every iterator borrowing
//! a rep) holding an `Arc` to it is gone.

pub mod chunked;

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub use chunked::ChunkedVec;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Stable reference to an entry stored in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyHandle(u32);

impl KeyHandle {
    /// Refers to no entry. Used as the empty marker in link fields.
    pub const NONE: KeyHandle = KeyHandle(u32::MAX);

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn from_index(index: u32) -> Self {
        KeyHandle(index)
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// A writable buffer reserved by [`Arena::allocate`].
///
/// The caller encodes its entry into the buffer, then hands it to
/// `MemTableRep::insert`, which publishes the bytes and links the handle.
/// Once published, the bytes are immutable.
pub struct EntryBuf {
    arena_id: u64,
    handle: KeyHandle,
    bytes: Box<[u8]>,
}

impl EntryBuf {
    /// Handle the entry will be reachable under after insertion.
    pub fn handle(&self) -> KeyHandle {
        self.handle
    }
}

impl Deref for EntryBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for EntryBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for EntryBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryBuf")
            .field("handle", &self.handle)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Owner of every entry's bytes.
///
/// Entries are never freed individually; all memory is released when the
/// last `Arc<Arena>` is dropped.
pub struct Arena {
    id: u64,
    entries: ChunkedVec<Box<[u8]>>,
    bytes_published: AtomicUsize,
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            entries: ChunkedVec::new(),
            bytes_published: AtomicUsize::new(0),
        }
    }

    /// Reserve `len` zeroed bytes and a handle for a caller-built entry.
    pub fn allocate(&self, len: usize) -> EntryBuf {
        EntryBuf {
            arena_id: self.id,
            handle: KeyHandle(self.entries.reserve()),
            bytes: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// Make a filled buffer readable through its handle.
    ///
    /// # Panics
    /// Panics if `buf` was allocated by another arena.
    pub fn publish(&self, buf: EntryBuf) -> KeyHandle {
        let EntryBuf {
            arena_id,
            handle,
            bytes,
        } = buf;
        assert_eq!(
            arena_id, self.id,
            "entry buffer was allocated by a different arena"
        );
        self.bytes_published.fetch_add(bytes.len(), Ordering::Relaxed);
        self.entries.publish(handle.0, bytes);
        handle
    }

    /// Bytes of a published entry.
    ///
    /// # Panics
    /// Panics if the handle was never published to this arena.
    pub fn get(&self, handle: KeyHandle) -> &[u8] {
        match self.entries.get(handle.0) {
            Some(bytes) => bytes,
            None => panic!("key handle {} was never published", handle.0),
        }
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Published entry bytes plus slot bookkeeping. A buffer dropped
    /// without being published costs nothing here.
    pub fn memory_usage(&self) -> usize {
        self.bytes_published.load(Ordering::Relaxed)
            + self.entries.allocated_bytes()
            + self.entries.len() * mem::size_of::<Box<[u8]>>()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_fill_publish_get() {
        let arena = Arena::new();
        let mut buf = arena.allocate(3);
        buf.copy_from_slice(b"abc");
        let handle = buf.handle();
        assert_eq!(arena.publish(buf), handle);
        assert_eq!(arena.get(handle), b"abc");
        assert_eq!(arena.len(), 1);
        assert!(arena.memory_usage() >= 3);
    }

    #[test]
    #[should_panic(expected = "different arena")]
    fn publish_into_foreign_arena_panics() {
        let a = Arena::new();
        let b = Arena::new();
        let buf = a.allocate(1);
        b.publish(buf);
    }

    #[test]
    #[should_panic(expected = "never published")]
    fn reading_unpublished_handle_panics() {
        let arena = Arena::new();
        let buf = arena.allocate(1);
        arena.get(buf.handle());
    }
}

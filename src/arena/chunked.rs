use std::mem;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

const FIRST_CHUNK_BITS: u32 = 6;
const FIRST_CHUNK_LEN: usize = 1 << FIRST_CHUNK_BITS;

/// Enough chunks to address every `u32` index.
const CHUNK_COUNT: usize = (u32::BITS + 1 - FIRST_CHUNK_BITS) as usize;

/// Append-only vector that one writer grows while any number of readers
/// index into it without locks.
///
/// Storage is a fixed directory of chunks whose sizes double:
///
/// ```text
/// chunk 0:  [ 0 .. 64 )
/// chunk 1:  [ 64 .. 192 )
/// chunk 2:  [ 192 .. 448 )
/// ...
/// ```
///
/// A chunk never moves once allocated, so references handed out by `get`
/// stay valid for the life of the vector. Each slot is a `OnceLock`:
/// setting it is the release that publishes the value, and `get` is the
/// matching acquire. Structures built on top must store an index only after
/// `publish` returns.
pub struct ChunkedVec<T> {
    chunks: [OnceLock<Box<[OnceLock<T>]>>; CHUNK_COUNT],
    reserved: AtomicUsize,
    published: AtomicUsize,
}

impl<T> ChunkedVec<T> {
    pub fn new() -> Self {
        ChunkedVec {
            chunks: std::array::from_fn(|_| OnceLock::new()),
            reserved: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
        }
    }

    /// Claim the next index without storing anything in it yet.
    pub fn reserve(&self) -> u32 {
        let index = self.reserved.fetch_add(1, Ordering::Relaxed);
        assert!(index < u32::MAX as usize, "chunked vector is full");
        index as u32
    }

    /// Store `value` at a reserved index.
    ///
    /// # Panics
    /// Panics if the slot was already published.
    pub fn publish(&self, index: u32, value: T) {
        let (chunk, offset) = locate(index);
        let slots = self.chunks[chunk].get_or_init(|| {
            (0..FIRST_CHUNK_LEN << chunk)
                .map(|_| OnceLock::new())
                .collect()
        });
        if slots[offset].set(value).is_err() {
            panic!("slot {index} published twice");
        }
        self.published.fetch_add(1, Ordering::Release);
    }

    /// Append a value and return its index.
    pub fn push(&self, value: T) -> u32 {
        let index = self.reserve();
        self.publish(index, value);
        index
    }

    /// Value at `index`, or `None` if it has not been published.
    pub fn get(&self, index: u32) -> Option<&T> {
        let (chunk, offset) = locate(index);
        self.chunks[chunk].get()?.get(offset)?.get()
    }

    /// Number of published slots.
    pub fn len(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the chunk directory and slots (not by heap data the
    /// values themselves own).
    pub fn allocated_bytes(&self) -> usize {
        let slots: usize = self
            .chunks
            .iter()
            .filter_map(OnceLock::get)
            .map(|chunk| chunk.len())
            .sum();
        mem::size_of::<Self>() + slots * mem::size_of::<OnceLock<T>>()
    }
}

impl<T> Default for ChunkedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an index to (chunk, offset within chunk).
fn locate(index: u32) -> (usize, usize) {
    let biased = index as usize + FIRST_CHUNK_LEN;
    let bit = usize::BITS - 1 - biased.leading_zeros();
    let chunk = (bit - FIRST_CHUNK_BITS) as usize;
    (chunk, biased - (1 << bit))
}

//! # LSM write buffer representations
//!
//! The in-memory write buffer of an LSM-tree engine accepts every new
//! write, serves reads of recent data, and is finally flushed to disk as a
//! sorted run. This crate provides the sorted collection behind that
//! buffer, with several interchangeable strategies.
//!
//! ## Core idea
//! Entries are encoded once into an arena and never move or disappear.
//! Each representation keeps only handles to them, ordered by internal
//! key: user key ascending, then sequence number descending. A single
//! writer inserts while readers look up and scan without taking locks.
//!
//! ```text
//!   factory ──create──► MemTableRep ──handles──► Arena (entry bytes)
//!                          │
//!            writer: allocate → encode → insert
//!            readers: contains / get / iter
//! ```

pub mod arena;
pub mod comparator;
pub mod config;
pub mod error;
pub mod iterator;
pub mod memtable;
pub mod transform;
pub mod types;

pub use arena::{Arena, EntryBuf, KeyHandle};
pub use comparator::{InternalKeyComparator, KeyComparator};
pub use config::RepConfig;
pub use error::{Error, Result};
pub use iterator::RepIterator;
pub use memtable::{MemTableRep, MemTableRepFactory, add_entry};
pub use transform::SliceTransform;
pub use types::{LookupKey, SequenceNumber, ValueType};

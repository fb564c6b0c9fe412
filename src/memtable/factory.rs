//! Factories: the only way a write buffer gets its representation.
//!
//! A factory fixes the strategy and its options when it is built. Every rep
//! it creates afterwards uses exactly those settings.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::arena::Arena;
use crate::comparator::KeyComparator;
use crate::error::{Error, Result};
use crate::memtable::skiplist::HEIGHT_LIMIT;
use crate::memtable::{
    HashCuckooRep, HashLinkListRep, HashSkipListRep, MemTableRep, SkipListRep, VectorRep,
};
use crate::transform::SliceTransform;

/// Builds one representation per write buffer.
pub trait MemTableRepFactory: Send + Sync {
    /// Stable strategy name, for diagnostics and configuration.
    fn name(&self) -> &'static str;

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkipListFactory;

impl MemTableRepFactory for SkipListFactory {
    fn name(&self) -> &'static str {
        "SkipListFactory"
    }

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        _prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>> {
        debug!(factory = self.name(), "creating memtable rep");
        Ok(Box::new(SkipListRep::new(cmp, arena)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorRepFactory {
    /// Initial capacity hint.
    pub count: usize,
}

impl VectorRepFactory {
    pub fn new(count: usize) -> Self {
        VectorRepFactory { count }
    }
}

impl MemTableRepFactory for VectorRepFactory {
    fn name(&self) -> &'static str {
        "VectorRepFactory"
    }

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        _prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>> {
        debug!(factory = self.name(), count = self.count, "creating memtable rep");
        Ok(Box::new(VectorRep::new(cmp, arena, self.count)))
    }
}

fn require_transform(
    factory: &'static str,
    prefix_extractor: Option<Arc<dyn SliceTransform>>,
) -> Result<Arc<dyn SliceTransform>> {
    prefix_extractor.ok_or(Error::MissingPrefixExtractor(factory))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSkipListOptions {
    pub bucket_count: usize,
    pub skiplist_height: usize,
    pub skiplist_branching_factor: u32,
}

impl Default for HashSkipListOptions {
    fn default() -> Self {
        HashSkipListOptions {
            bucket_count: 1_000_000,
            skiplist_height: 4,
            skiplist_branching_factor: 4,
        }
    }
}

impl HashSkipListOptions {
    pub fn with_bucket_count(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    pub fn with_skiplist_height(mut self, height: usize) -> Self {
        self.skiplist_height = height;
        self
    }

    pub fn with_skiplist_branching_factor(mut self, branching: u32) -> Self {
        self.skiplist_branching_factor = branching;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(Error::InvalidConfig("bucket_count must be positive".into()));
        }
        if !(1..=HEIGHT_LIMIT).contains(&self.skiplist_height) {
            return Err(Error::InvalidConfig(format!(
                "skiplist_height {} outside 1..={HEIGHT_LIMIT}",
                self.skiplist_height
            )));
        }
        if self.skiplist_branching_factor < 2 {
            return Err(Error::InvalidConfig(format!(
                "skiplist_branching_factor {} must be at least 2",
                self.skiplist_branching_factor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashSkipListRepFactory {
    options: HashSkipListOptions,
}

impl HashSkipListRepFactory {
    pub fn new(options: HashSkipListOptions) -> Result<Self> {
        options.validate()?;
        Ok(HashSkipListRepFactory { options })
    }

    pub fn options(&self) -> &HashSkipListOptions {
        &self.options
    }
}

impl MemTableRepFactory for HashSkipListRepFactory {
    fn name(&self) -> &'static str {
        "HashSkipListRepFactory"
    }

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>> {
        let transform = require_transform(self.name(), prefix_extractor)?;
        let o = self.options;
        debug!(
            factory = self.name(),
            transform = transform.name(),
            bucket_count = o.bucket_count,
            height = o.skiplist_height,
            branching = o.skiplist_branching_factor,
            "creating memtable rep"
        );
        Ok(Box::new(HashSkipListRep::new(
            cmp,
            arena,
            transform,
            o.bucket_count,
            o.skiplist_height,
            o.skiplist_branching_factor,
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLinkListOptions {
    pub bucket_count: usize,
    /// Huge page size requested for the bucket array, 0 for none.
    pub huge_page_tlb_size: usize,
}

impl Default for HashLinkListOptions {
    fn default() -> Self {
        HashLinkListOptions {
            bucket_count: 50_000,
            huge_page_tlb_size: 0,
        }
    }
}

impl HashLinkListOptions {
    pub fn with_bucket_count(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    pub fn with_huge_page_tlb_size(mut self, size: usize) -> Self {
        self.huge_page_tlb_size = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(Error::InvalidConfig("bucket_count must be positive".into()));
        }
        if self.huge_page_tlb_size != 0 && !self.huge_page_tlb_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "huge_page_tlb_size {} is not a power of two",
                self.huge_page_tlb_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashLinkListRepFactory {
    options: HashLinkListOptions,
}

impl HashLinkListRepFactory {
    pub fn new(options: HashLinkListOptions) -> Result<Self> {
        options.validate()?;
        Ok(HashLinkListRepFactory { options })
    }

    pub fn options(&self) -> &HashLinkListOptions {
        &self.options
    }
}

impl MemTableRepFactory for HashLinkListRepFactory {
    fn name(&self) -> &'static str {
        "HashLinkListRepFactory"
    }

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>> {
        let transform = require_transform(self.name(), prefix_extractor)?;
        debug!(
            factory = self.name(),
            transform = transform.name(),
            bucket_count = self.options.bucket_count,
            "creating memtable rep"
        );
        Ok(Box::new(HashLinkListRep::new(
            cmp,
            arena,
            transform,
            self.options.bucket_count,
            self.options.huge_page_tlb_size,
        )))
    }
}

/// Target fill ratio of the cuckoo table.
const CUCKOO_MAX_OCCUPANCY: f64 = 0.7;

/// Bounds on the number of cuckoo hash functions.
pub const MIN_HASH_FUNCTIONS: usize = 2;
pub const MAX_HASH_FUNCTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCuckooOptions {
    /// Write buffer size the table is sized for.
    pub write_buffer_size: usize,
    /// Expected encoded entry size.
    pub average_data_size: usize,
    pub hash_function_count: usize,
}

impl HashCuckooOptions {
    pub fn new(write_buffer_size: usize) -> Self {
        HashCuckooOptions {
            write_buffer_size,
            average_data_size: 64,
            hash_function_count: 4,
        }
    }

    pub fn with_average_data_size(mut self, size: usize) -> Self {
        self.average_data_size = size;
        self
    }

    pub fn with_hash_function_count(mut self, count: usize) -> Self {
        self.hash_function_count = count;
        self
    }

    /// Slots needed to hold `write_buffer_size` worth of entries at the
    /// target occupancy. Each slot costs one handle on top of the entry.
    pub fn bucket_count(&self) -> usize {
        let slot_bytes = self.average_data_size + std::mem::size_of::<u32>();
        let entries = self.write_buffer_size / slot_bytes;
        (entries as f64 / CUCKOO_MAX_OCCUPANCY) as usize + 1
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashCuckooRepFactory {
    options: HashCuckooOptions,
}

impl HashCuckooRepFactory {
    /// An out-of-range `hash_function_count` is clamped to
    /// `MIN_HASH_FUNCTIONS..=MAX_HASH_FUNCTIONS`.
    pub fn new(mut options: HashCuckooOptions) -> Result<Self> {
        if options.write_buffer_size == 0 {
            return Err(Error::InvalidConfig("write_buffer_size must be positive".into()));
        }
        if options.average_data_size == 0 {
            return Err(Error::InvalidConfig("average_data_size must be positive".into()));
        }
        let clamped = options
            .hash_function_count
            .clamp(MIN_HASH_FUNCTIONS, MAX_HASH_FUNCTIONS);
        if clamped != options.hash_function_count {
            warn!(
                requested = options.hash_function_count,
                using = clamped,
                "cuckoo hash_function_count out of range"
            );
            options.hash_function_count = clamped;
        }
        Ok(HashCuckooRepFactory { options })
    }

    pub fn options(&self) -> &HashCuckooOptions {
        &self.options
    }
}

impl MemTableRepFactory for HashCuckooRepFactory {
    fn name(&self) -> &'static str {
        "HashCuckooRepFactory"
    }

    fn create_memtable_rep(
        &self,
        cmp: Arc<dyn KeyComparator>,
        arena: Arc<Arena>,
        _prefix_extractor: Option<Arc<dyn SliceTransform>>,
    ) -> Result<Box<dyn MemTableRep>> {
        debug!(factory = self.name(), "creating memtable rep");
        Ok(Box::new(HashCuckooRep::new(
            cmp,
            arena,
            self.options.bucket_count(),
            self.options.hash_function_count,
        )))
    }
}

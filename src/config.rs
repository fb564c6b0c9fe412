//! Textual representation selection.
//!
//! ```text
//!   skip_list
//!   vector[:count]
//!   prefix_hash[:bucket_count[:skiplist_height:branching_factor]]
//!   hash_linkedlist[:bucket_count[:huge_page_tlb_size]]
//!   cuckoo:write_buffer_size[:average_data_size[:hash_function_count]]
//! ```
//!
//! `Display` writes the shortest form that parses back to the same config:
//! trailing fields are printed only when they differ from their defaults.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::memtable::{
    HashCuckooOptions, HashCuckooRepFactory, HashLinkListOptions, HashLinkListRepFactory,
    HashSkipListOptions, HashSkipListRepFactory, MemTableRepFactory, SkipListFactory,
    VectorRepFactory,
};

/// A representation strategy together with its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepConfig {
    #[default]
    SkipList,
    Vector {
        count: usize,
    },
    HashSkipList(HashSkipListOptions),
    HashLinkList(HashLinkListOptions),
    HashCuckoo(HashCuckooOptions),
}

impl RepConfig {
    /// Validate the options and build the matching factory.
    pub fn build(&self) -> Result<Arc<dyn MemTableRepFactory>> {
        let factory: Arc<dyn MemTableRepFactory> = match *self {
            RepConfig::SkipList => Arc::new(SkipListFactory),
            RepConfig::Vector { count } => Arc::new(VectorRepFactory::new(count)),
            RepConfig::HashSkipList(o) => Arc::new(HashSkipListRepFactory::new(o)?),
            RepConfig::HashLinkList(o) => Arc::new(HashLinkListRepFactory::new(o)?),
            RepConfig::HashCuckoo(o) => Arc::new(HashCuckooRepFactory::new(o)?),
        };
        Ok(factory)
    }
}

fn parse_number<T: FromStr>(kind: &str, arg: &str) -> Result<T> {
    arg.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{kind}: bad number {arg:?}")))
}

impl FromStr for RepConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let kind = parts.next().unwrap_or_default().trim();
        let args: Vec<&str> = parts.collect();

        match (kind, args.as_slice()) {
            ("skip_list", []) => Ok(RepConfig::SkipList),
            ("vector", []) => Ok(RepConfig::Vector { count: 0 }),
            ("vector", [n]) => Ok(RepConfig::Vector {
                count: parse_number(kind, n)?,
            }),
            ("prefix_hash", [] | [_] | [_, _, _]) => {
                let mut options = HashSkipListOptions::default();
                if let Some(n) = args.first() {
                    options = options.with_bucket_count(parse_number(kind, n)?);
                }
                if let [_, height, branching] = args.as_slice() {
                    options = options
                        .with_skiplist_height(parse_number(kind, height)?)
                        .with_skiplist_branching_factor(parse_number(kind, branching)?);
                }
                Ok(RepConfig::HashSkipList(options))
            }
            ("hash_linkedlist", [] | [_] | [_, _]) => {
                let mut options = HashLinkListOptions::default();
                if let Some(n) = args.first() {
                    options = options.with_bucket_count(parse_number(kind, n)?);
                }
                if let Some(size) = args.get(1) {
                    options = options.with_huge_page_tlb_size(parse_number(kind, size)?);
                }
                Ok(RepConfig::HashLinkList(options))
            }
            ("cuckoo", [size, rest @ ..]) if rest.len() <= 2 => {
                let mut options = HashCuckooOptions::new(parse_number(kind, size)?);
                if let Some(avg) = rest.first() {
                    options = options.with_average_data_size(parse_number(kind, avg)?);
                }
                if let Some(count) = rest.get(1) {
                    options = options.with_hash_function_count(parse_number(kind, count)?);
                }
                Ok(RepConfig::HashCuckoo(options))
            }
            ("cuckoo", []) => Err(Error::InvalidConfig(
                "cuckoo requires a write buffer size (cuckoo:<bytes>)".into(),
            )),
            _ => Err(Error::InvalidConfig(format!("unknown memtable rep {s:?}"))),
        }
    }
}

impl fmt::Display for RepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepConfig::SkipList => write!(f, "skip_list"),
            RepConfig::Vector { count } => write!(f, "vector:{count}"),
            RepConfig::HashSkipList(o) => {
                write!(f, "prefix_hash:{}", o.bucket_count)?;
                let defaults = HashSkipListOptions::default();
                if o.skiplist_height != defaults.skiplist_height
                    || o.skiplist_branching_factor != defaults.skiplist_branching_factor
                {
                    write!(f, ":{}:{}", o.skiplist_height, o.skiplist_branching_factor)?;
                }
                Ok(())
            }
            RepConfig::HashLinkList(o) => {
                write!(f, "hash_linkedlist:{}", o.bucket_count)?;
                if o.huge_page_tlb_size != 0 {
                    write!(f, ":{}", o.huge_page_tlb_size)?;
                }
                Ok(())
            }
            RepConfig::HashCuckoo(o) => {
                write!(f, "cuckoo:{}", o.write_buffer_size)?;
                let defaults = HashCuckooOptions::new(o.write_buffer_size);
                let custom_count = o.hash_function_count != defaults.hash_function_count;
                if custom_count || o.average_data_size != defaults.average_data_size {
                    write!(f, ":{}", o.average_data_size)?;
                }
                if custom_count {
                    write!(f, ":{}", o.hash_function_count)?;
                }
                Ok(())
            }
        }
    }
}

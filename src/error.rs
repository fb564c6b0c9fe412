use thiserror::Error;

/// Errors raised while building or configuring a representation.
///
/// Operations on a live rep never return errors. Caller contract
/// violations (insert after read-only, key() on an invalid iterator, ...)
/// panic instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A factory option or textual config was rejected.
    #[error("invalid memtable config: {0}")]
    InvalidConfig(String),

    /// A hash-bucketed representation was created without a prefix extractor.
    #[error("{0} requires a prefix extractor")]
    MissingPrefixExtractor(&'static str),

    /// Entry bytes could not be decoded.
    #[error("corruption: {0}")]
    Corruption(String),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

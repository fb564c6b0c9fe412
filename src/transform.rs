/// Maps a user key to the prefix the hash-based representations bucket by.
pub trait SliceTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract the prefix. Only called on keys that are `in_domain`.
    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8];

    /// Whether `transform` is defined for this key.
    fn in_domain(&self, key: &[u8]) -> bool;

    /// Bucketing prefix of any key: keys outside the domain use the whole key.
    fn prefix_of<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        if self.in_domain(key) {
            self.transform(key)
        } else {
            key
        }
    }

    /// Whether two keys land on the same prefix.
    fn same_prefix(&self, a: &[u8], b: &[u8]) -> bool {
        self.prefix_of(a) == self.prefix_of(b)
    }
}

/// First `n` bytes. Keys shorter than `n` are outside the domain.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrefixTransform {
    prefix_len: usize,
}

impl FixedPrefixTransform {
    pub fn new(prefix_len: usize) -> Self {
        FixedPrefixTransform { prefix_len }
    }
}

impl SliceTransform for FixedPrefixTransform {
    fn name(&self) -> &'static str {
        "lsm.FixedPrefix"
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        &key[..self.prefix_len]
    }

    fn in_domain(&self, key: &[u8]) -> bool {
        key.len() >= self.prefix_len
    }
}

/// Up to the first `n` bytes; every key is in the domain.
#[derive(Debug, Clone, Copy)]
pub struct CappedPrefixTransform {
    cap_len: usize,
}

impl CappedPrefixTransform {
    pub fn new(cap_len: usize) -> Self {
        CappedPrefixTransform { cap_len }
    }
}

impl SliceTransform for CappedPrefixTransform {
    fn name(&self) -> &'static str {
        "lsm.CappedPrefix"
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        &key[..key.len().min(self.cap_len)]
    }

    fn in_domain(&self, _key: &[u8]) -> bool {
        true
    }
}

/// The whole key is the prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransform;

impl SliceTransform for NoopTransform {
    fn name(&self) -> &'static str {
        "lsm.Noop"
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        key
    }

    fn in_domain(&self, _key: &[u8]) -> bool {
        true
    }
}

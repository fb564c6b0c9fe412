use crate::iterator::{INVALID_ITERATOR, RepIterator};
use crate::transform::SliceTransform;
use crate::types::{entry_user_key, extract_user_key};

/// Iterator whose `seek` is confined to the target's prefix.
///
/// Every `seek` looks up the bucket holding the target's prefix (through
/// `bucket_iter`) and iterates only that bucket. Hash collisions can put
/// other prefixes in the same bucket, so the iterator also turns invalid
/// as soon as it steps onto an entry with a different prefix.
///
/// There is no total order across prefixes: `seek_to_first` and
/// `seek_to_last` leave the iterator invalid.
pub struct DynamicPrefixIterator<'a, I, F> {
    transform: &'a dyn SliceTransform,
    bucket_iter: F,
    prefix: Vec<u8>,
    inner: Option<I>,
}

impl<'a, I, F> DynamicPrefixIterator<'a, I, F>
where
    I: RepIterator,
    F: Fn(&[u8]) -> Option<I>,
{
    /// `bucket_iter(user_key)` returns an iterator over the bucket the user
    /// key hashes to, or `None` if that bucket is empty.
    pub fn new(transform: &'a dyn SliceTransform, bucket_iter: F) -> Self {
        DynamicPrefixIterator {
            transform,
            bucket_iter,
            prefix: Vec::new(),
            inner: None,
        }
    }

    fn inner_mut(&mut self) -> &mut I {
        match self.inner.as_mut() {
            Some(inner) if inner.valid() => inner,
            _ => panic!("{INVALID_ITERATOR}"),
        }
    }

    /// Drop the bucket once the cursor leaves the prefix.
    fn clamp(&mut self) {
        if let Some(inner) = &self.inner {
            if inner.valid() {
                let user_key = entry_user_key(inner.key());
                if self.transform.prefix_of(user_key) == self.prefix.as_slice() {
                    return;
                }
            }
        }
        self.inner = None;
    }
}

impl<I, F> RepIterator for DynamicPrefixIterator<'_, I, F>
where
    I: RepIterator,
    F: Fn(&[u8]) -> Option<I>,
{
    fn valid(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.valid())
    }

    fn key(&self) -> &[u8] {
        match &self.inner {
            Some(inner) => inner.key(),
            None => panic!("{INVALID_ITERATOR}"),
        }
    }

    fn next(&mut self) {
        self.inner_mut().next();
        self.clamp();
    }

    fn prev(&mut self) {
        self.inner_mut().prev();
        self.clamp();
    }

    fn seek(&mut self, internal_key: &[u8]) {
        let user_key = extract_user_key(internal_key);
        self.prefix.clear();
        self.prefix.extend_from_slice(self.transform.prefix_of(user_key));
        self.inner = (self.bucket_iter)(user_key);
        if let Some(inner) = self.inner.as_mut() {
            inner.seek(internal_key);
        }
        self.clamp();
    }

    fn seek_to_first(&mut self) {
        self.inner = None;
    }

    fn seek_to_last(&mut self) {
        self.inner = None;
    }
}

use std::cmp::Ordering;

use crate::types::{entry_internal_key, extract_tag, extract_user_key};

/// Total order over encoded keys, shared by every representation and iterator.
///
/// Implementors only order internal keys; entries are compared through the
/// internal key they start with, so values never influence the order.
pub trait KeyComparator: Send + Sync {
    /// Stable name for diagnostics.
    fn name(&self) -> &'static str;

    /// Order two encoded internal keys (`user_key ++ tag`).
    fn compare_internal_keys(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Order two encoded entries.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.compare_internal_keys(entry_internal_key(a), entry_internal_key(b))
    }

    /// Order an encoded entry against a bare internal key (a seek target).
    fn compare_key(&self, entry: &[u8], internal_key: &[u8]) -> Ordering {
        self.compare_internal_keys(entry_internal_key(entry), internal_key)
    }
}

/// Default ordering: user key bytewise ascending, then sequence descending,
/// then value type descending.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalKeyComparator;

impl KeyComparator for InternalKeyComparator {
    fn name(&self) -> &'static str {
        "lsm.InternalKeyComparator"
    }

    fn compare_internal_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        extract_user_key(a)
            .cmp(extract_user_key(b))
            // the tag packs sequence above type, so one descending compare covers both
            .then_with(|| extract_tag(b).cmp(&extract_tag(a)))
    }
}

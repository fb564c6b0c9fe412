use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Monotonically increasing write counter assigned by the owning layer.
pub type SequenceNumber = u64;

/// Sequence numbers share a u64 with the value type, leaving 56 bits.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Size of the packed (sequence, type) tag that ends every internal key.
pub const TAG_SIZE: usize = 8;

const LEN_SIZE: usize = 4;

/// Distinguishes puts from deletes and merges.
/// A Delete writes a tombstone: the key isn't removed, it's marked as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// A normal put operation.
    Put = 0x01,
    /// A delete (tombstone marker).
    Delete = 0x02,
    /// A merge operand.
    Merge = 0x03,
}

/// Largest value type. A lookup key built with it sorts before every entry
/// of the same user key and sequence, so a seek lands on the newest visible
/// version.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Merge;

impl ValueType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(ValueType::Put),
            0x02 => Ok(ValueType::Delete),
            0x03 => Ok(ValueType::Merge),
            _ => Err(Error::Corruption(format!("invalid value type: {byte}"))),
        }
    }
}

/// Pack a sequence number and value type into the 8-byte tag.
pub fn pack_tag(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    assert!(
        sequence <= MAX_SEQUENCE_NUMBER,
        "sequence number {sequence} exceeds 56 bits"
    );
    (sequence << 8) | value_type as u64
}

/// Split a tag into (sequence, raw value type).
pub fn unpack_tag(tag: u64) -> (SequenceNumber, u8) {
    (tag >> 8, (tag & 0xff) as u8)
}

/// User key part of an encoded internal key.
///
/// # Panics
/// Panics if `internal_key` is shorter than the tag.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    &internal_key[..internal_key.len() - TAG_SIZE]
}

/// Tag part of an encoded internal key.
pub fn extract_tag(internal_key: &[u8]) -> u64 {
    read_u64(&internal_key[internal_key.len() - TAG_SIZE..])
}

// =============================================================================
// Entry layout
// =============================================================================

/// Number of bytes an entry with the given user key and value occupies.
pub fn encoded_entry_len(user_key_len: usize, value_len: usize) -> usize {
    LEN_SIZE + user_key_len + TAG_SIZE + LEN_SIZE + value_len
}

/// Write an entry into a buffer obtained from `MemTableRep::allocate`.
///
/// Layout:
/// ```text
/// ┌──────────────┬──────────┬──────────┬──────────────┬─────────┐
/// │ ikey_len(4B) │ user_key │ tag (8B) │ value_len(4B)│  value  │
/// └──────────────┴──────────┴──────────┴──────────────┴─────────┘
/// ```
/// `ikey_len` covers `user_key` + `tag`, i.e. the internal key.
///
/// # Panics
/// Panics if `buf` is not exactly `encoded_entry_len(user_key.len(), value.len())` bytes.
pub fn encode_entry(
    buf: &mut [u8],
    user_key: &[u8],
    sequence: SequenceNumber,
    value_type: ValueType,
    value: &[u8],
) {
    assert_eq!(
        buf.len(),
        encoded_entry_len(user_key.len(), value.len()),
        "entry buffer has the wrong length"
    );
    let ikey_len = (user_key.len() + TAG_SIZE) as u32;
    let mut offset = 0;

    buf[offset..offset + LEN_SIZE].copy_from_slice(&ikey_len.to_le_bytes());
    offset += LEN_SIZE;

    buf[offset..offset + user_key.len()].copy_from_slice(user_key);
    offset += user_key.len();

    buf[offset..offset + TAG_SIZE].copy_from_slice(&pack_tag(sequence, value_type).to_le_bytes());
    offset += TAG_SIZE;

    buf[offset..offset + LEN_SIZE].copy_from_slice(&(value.len() as u32).to_le_bytes());
    offset += LEN_SIZE;

    buf[offset..].copy_from_slice(value);
}

/// Internal key of an encoded entry. Assumes a well-formed entry.
pub fn entry_internal_key(entry: &[u8]) -> &[u8] {
    let ikey_len = read_u32(entry) as usize;
    &entry[LEN_SIZE..LEN_SIZE + ikey_len]
}

/// User key of an encoded entry.
pub fn entry_user_key(entry: &[u8]) -> &[u8] {
    extract_user_key(entry_internal_key(entry))
}

/// Value of an encoded entry.
pub fn entry_value(entry: &[u8]) -> &[u8] {
    let value_len_at = LEN_SIZE + read_u32(entry) as usize;
    let value_len = read_u32(&entry[value_len_at..]) as usize;
    let start = value_len_at + LEN_SIZE;
    &entry[start..start + value_len]
}

/// A fully decoded entry borrowing from arena memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEntry<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
    pub value: &'a [u8],
}

impl<'a> ParsedEntry<'a> {
    /// Decode an entry, validating every length field.
    pub fn decode(entry: &'a [u8]) -> Result<Self> {
        if entry.len() < LEN_SIZE {
            return Err(Error::Corruption("entry too short".into()));
        }
        let ikey_len = read_u32(entry) as usize;
        if ikey_len < TAG_SIZE {
            return Err(Error::Corruption("internal key shorter than tag".into()));
        }
        let ikey_end = LEN_SIZE + ikey_len;
        if entry.len() < ikey_end + LEN_SIZE {
            return Err(Error::Corruption("entry truncated in key".into()));
        }
        let internal_key = &entry[LEN_SIZE..ikey_end];
        let (sequence, raw_type) = unpack_tag(extract_tag(internal_key));
        let value_type = ValueType::from_u8(raw_type)?;

        let value_len = read_u32(&entry[ikey_end..]) as usize;
        let value_start = ikey_end + LEN_SIZE;
        if entry.len() != value_start + value_len {
            return Err(Error::Corruption(format!(
                "value length {value_len} does not match entry size {}",
                entry.len()
            )));
        }

        Ok(ParsedEntry {
            user_key: extract_user_key(internal_key),
            sequence,
            value_type,
            value: &entry[value_start..],
        })
    }
}

// =============================================================================
// Owned internal key
// =============================================================================

/// Internal key format: user key + sequence number + value type.
///
/// Ordering: (user_key ASC, sequence DESC, value_type DESC).
/// The newest version of a key always comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    pub user_key: Vec<u8>,
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Vec<u8>>, sequence: SequenceNumber, value_type: ValueType) -> Self {
        InternalKey {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    /// Encode as `user_key ++ tag`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.user_key.len() + TAG_SIZE);
        buf.extend_from_slice(&self.user_key);
        buf.extend_from_slice(&pack_tag(self.sequence, self.value_type).to_le_bytes());
        buf
    }

    pub fn decode(internal_key: &[u8]) -> Result<Self> {
        if internal_key.len() < TAG_SIZE {
            return Err(Error::Corruption("internal key shorter than tag".into()));
        }
        let (sequence, raw_type) = unpack_tag(extract_tag(internal_key));
        Ok(InternalKey {
            user_key: extract_user_key(internal_key).to_vec(),
            sequence,
            value_type: ValueType::from_u8(raw_type)?,
        })
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.value_type.cmp(&self.value_type))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// Lookup key
// =============================================================================

/// A (user key, read sequence) pair encoded as an internal key for `Get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    internal_key: Vec<u8>,
}

impl LookupKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber) -> Self {
        LookupKey {
            internal_key: InternalKey::new(user_key, sequence, VALUE_TYPE_FOR_SEEK).encode(),
        }
    }

    /// The internal key to seek to.
    pub fn internal_key(&self) -> &[u8] {
        &self.internal_key
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.internal_key)
    }

    pub fn sequence(&self) -> SequenceNumber {
        unpack_tag(extract_tag(&self.internal_key)).0
    }
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_u64(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(bytes)
}

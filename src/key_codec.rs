//! Fixed-width encoding of posting values.
//!
//! A posting value is the 16 raw bytes of the document UUID followed by the
//! posting ordinal as a little-endian `i64`. Postings written before ordinals
//! were tracked carry only the 16 UUID bytes; both forms decode.

use byteorder::{ByteOrder, LittleEndian};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Length of a legacy posting value (UUID only).
pub const SHORT_VALUE_LEN: usize = 16;

/// Length of an ordinal-aware posting value.
pub const VALUE_LEN: usize = 24;

/// Longest term, in bytes, stored as an index key.
pub const MAX_TERM_BYTES: usize = 255;

/// Truncate a term to at most [`MAX_TERM_BYTES`] bytes on a character boundary.
pub fn truncate_term(term: &str) -> &str {
    if term.len() <= MAX_TERM_BYTES {
        return term;
    }
    let mut end = MAX_TERM_BYTES;
    while !term.is_char_boundary(end) {
        end -= 1;
    }
    &term[..end]
}

/// Pack a document id and ordinal into a posting value.
pub fn pack(id: &Uuid, ordinal: i64) -> [u8; VALUE_LEN] {
    let mut value = [0u8; VALUE_LEN];
    value[..SHORT_VALUE_LEN].copy_from_slice(id.as_bytes());
    LittleEndian::write_i64(&mut value[SHORT_VALUE_LEN..], ordinal);
    value
}

/// Pack a document id into a legacy posting value.
pub fn pack_short(id: &Uuid) -> [u8; SHORT_VALUE_LEN] {
    *id.as_bytes()
}

/// Unpack a posting value into its document id and ordinal.
///
/// A 16-byte value has an implicit ordinal of 0. Any length other than 16 or
/// 24 fails with [`StoreError::CorruptIndexEntry`].
pub fn unpack(value: &[u8]) -> Result<(Uuid, i64)> {
    match value.len() {
        SHORT_VALUE_LEN | VALUE_LEN => {
            let mut id = [0u8; SHORT_VALUE_LEN];
            id.copy_from_slice(&value[..SHORT_VALUE_LEN]);
            let ordinal = if value.len() == VALUE_LEN {
                LittleEndian::read_i64(&value[SHORT_VALUE_LEN..])
            } else {
                0
            };
            Ok((Uuid::from_bytes(id), ordinal))
        }
        len => Err(StoreError::corrupt(format!(
            "posting value of {len} bytes, expected {SHORT_VALUE_LEN} or {VALUE_LEN}"
        ))),
    }
}

/// Whether a posting value refers to the given document.
pub fn belongs_to(value: &[u8], id: &Uuid) -> bool {
    value.len() >= SHORT_VALUE_LEN && &value[..SHORT_VALUE_LEN] == id.as_bytes()
}

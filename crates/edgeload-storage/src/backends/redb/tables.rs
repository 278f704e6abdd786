//! Redb table definitions and key/value layout.
//!
//! Since Redb requires static table names, logical tables are stored as key
//! prefixes within a single physical table:
//!
//! ```text
//! key:   <table name><0x00><logical key>
//! value: <meta: u8><payload>
//! ```

use redb::TableDefinition;

use crate::engine::{StorageError, StoredValue};

/// The physical table that stores all key-value pairs.
pub const DATA_TABLE: TableDefinition<'static, &[u8], &[u8]> =
    TableDefinition::new("edgeload_data");

/// Separator byte between table name and key in the encoded key.
pub const KEY_SEPARATOR: u8 = 0x00;

/// Encode a logical table name and key into a physical key.
pub fn encode_key(table: &str, key: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(table.len() + 1 + key.len());
    encoded.extend_from_slice(table.as_bytes());
    encoded.push(KEY_SEPARATOR);
    encoded.extend_from_slice(key);
    encoded
}

/// Strip the table prefix from a physical key.
///
/// Returns `None` if the key does not belong to `table`.
pub fn strip_table<'a>(table: &str, encoded: &'a [u8]) -> Option<&'a [u8]> {
    let rest = encoded.strip_prefix(table.as_bytes())?;
    rest.strip_prefix(&[KEY_SEPARATOR])
}

/// Create the end key for range scans on a logical table.
/// This is the first key that would NOT belong to the table.
pub fn table_end_key(table: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(table.len() + 1);
    key.extend_from_slice(table.as_bytes());
    key.push(KEY_SEPARATOR + 1);
    key
}

/// Encode a tagged value.
pub fn encode_value(meta: u8, value: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(1 + value.len());
    encoded.push(meta);
    encoded.extend_from_slice(value);
    encoded
}

/// Split a stored value into its tag and payload.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] if the value is empty.
pub fn decode_value(stored: &[u8]) -> Result<(u8, &[u8]), StorageError> {
    stored
        .split_first()
        .map(|(meta, value)| (*meta, value))
        .ok_or_else(|| StorageError::Corrupt("stored value has no metadata byte".to_owned()))
}

pub(crate) fn stored_value(stored: &[u8]) -> Result<StoredValue, StorageError> {
    let (meta, value) = decode_value(stored)?;
    Ok(StoredValue { meta, value: value.to_vec() })
}

/// Well-known table names.
pub mod names {
    /// Final posting lists and count indices.
    pub const POSTINGS: &str = "postings";

    /// Staged postings keyed by posting-list key and UID.
    pub const STAGED: &str = "staged";
}

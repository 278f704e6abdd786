//! Redb transaction and cursor implementation.
//!
//! Cursors stream the table in batches (default 1000 items) instead of
//! materializing it, fetching the next batch on demand as they advance.

use redb::{ReadTransaction, ReadableTable, WriteTransaction};

use crate::engine::{Cursor, KvItem, StorageError, StoredValue, Transaction};

use super::tables::{
    decode_value, encode_key, encode_value, stored_value, strip_table, table_end_key, DATA_TABLE,
};

/// Default batch size for cursor operations.
const DEFAULT_BATCH_SIZE: usize = 1000;

/// A transaction for the Redb storage engine.
#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    /// A read-only transaction.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl RedbTransaction {
    /// Create a new read-only transaction.
    pub const fn new_read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    /// Create a new read-write transaction.
    pub const fn new_write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }

    /// Fetch up to `limit` items of `table` with physical key >= `start`.
    fn fetch_batch(
        &self,
        table: &str,
        start: &[u8],
        limit: usize,
    ) -> Result<Vec<KvItem>, StorageError> {
        let end = table_end_key(table);
        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => scan(&t, table, start, &end, limit),
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
                Err(e) => Err(StorageError::internal(e)),
            },
            Self::Write(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => scan(&t, table, start, &end, limit),
                Err(e) => Err(StorageError::internal(e)),
            },
        }
    }
}

fn scan<T>(
    t: &T,
    table: &str,
    start: &[u8],
    end: &[u8],
    limit: usize,
) -> Result<Vec<KvItem>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut items = Vec::with_capacity(limit.min(1024));
    for result in t.range(start..end).map_err(StorageError::internal)? {
        if items.len() >= limit {
            break;
        }
        let (k, v) = result.map_err(StorageError::internal)?;
        let Some(key) = strip_table(table, k.value()) else {
            continue;
        };
        let (meta, value) = decode_value(v.value())?;
        items.push(KvItem { key: key.to_vec(), meta, value: value.to_vec() });
    }
    Ok(items)
}

fn lookup<T>(t: &T, key: &[u8]) -> Result<Option<StoredValue>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match t.get(key).map_err(StorageError::internal)? {
        Some(v) => stored_value(v.value()).map(Some),
        None => Ok(None),
    }
}

impl Transaction for RedbTransaction {
    type Cursor<'a>
        = RedbCursor<'a>
    where
        Self: 'a;

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<StoredValue>, StorageError> {
        let encoded_key = encode_key(table, key);
        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => lookup(&t, &encoded_key),
                // No data table means no data, which is not an error
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(StorageError::internal(e)),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE).map_err(StorageError::internal)?;
                lookup(&t, &encoded_key)
            }
        }
    }

    fn put(
        &mut self,
        table: &str,
        key: &[u8],
        meta: u8,
        value: &[u8],
    ) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let encoded_key = encode_key(table, key);
                let encoded_value = encode_value(meta, value);
                let mut t = tx.open_table(DATA_TABLE).map_err(StorageError::internal)?;
                t.insert(encoded_key.as_slice(), encoded_value.as_slice())
                    .map_err(StorageError::internal)?;
                Ok(())
            }
        }
    }

    fn cursor(&self, table: &str) -> Result<Self::Cursor<'_>, StorageError> {
        Ok(RedbCursor::new(self, table.to_owned(), DEFAULT_BATCH_SIZE))
    }

    fn commit(self) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.commit().map_err(StorageError::transaction),
        }
    }

    fn rollback(self) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.abort().map_err(StorageError::transaction),
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

/// A batched forward cursor over one logical table.
///
/// At any time the cursor holds at most `batch_size` items in memory.
pub struct RedbCursor<'a> {
    tx: &'a RedbTransaction,
    table: String,
    batch: Vec<KvItem>,
    position: usize,
    positioned: bool,
    batch_size: usize,
    has_more: bool,
}

impl<'a> RedbCursor<'a> {
    /// Create an unpositioned cursor.
    pub fn new(tx: &'a RedbTransaction, table: String, batch_size: usize) -> Self {
        Self {
            tx,
            table,
            batch: Vec::new(),
            position: 0,
            positioned: false,
            batch_size: batch_size.max(1),
            has_more: false,
        }
    }

    fn load_from(&mut self, physical_start: &[u8]) -> Result<(), StorageError> {
        self.batch = self.tx.fetch_batch(&self.table, physical_start, self.batch_size)?;
        self.has_more = self.batch.len() >= self.batch_size;
        self.position = 0;
        self.positioned = true;
        Ok(())
    }
}

impl Cursor for RedbCursor<'_> {
    fn seek(&mut self, key: &[u8]) -> Result<(), StorageError> {
        let start = encode_key(&self.table, key);
        self.load_from(&start)
    }

    fn seek_first(&mut self) -> Result<(), StorageError> {
        self.seek(&[])
    }

    fn valid(&self) -> bool {
        self.positioned && self.position < self.batch.len()
    }

    fn current(&self) -> Option<&KvItem> {
        if self.positioned {
            self.batch.get(self.position)
        } else {
            None
        }
    }

    fn next(&mut self) -> Result<(), StorageError> {
        if !self.positioned {
            return self.seek_first();
        }
        if self.position < self.batch.len() {
            self.position += 1;
        }
        if self.position >= self.batch.len() && self.has_more {
            // The smallest key strictly after `last` is `last` followed by 0x00.
            let Some(last) = self.batch.last() else {
                return Ok(());
            };
            let mut start = encode_key(&self.table, &last.key);
            start.push(0x00);
            self.load_from(&start)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::RedbEngine;
    use crate::engine::StorageEngine;

    fn fill(engine: &RedbEngine, table: &str, n: u32) {
        let mut tx = engine.begin_write().expect("begin write");
        for i in 0..n {
            tx.put(table, &i.to_be_bytes(), (i % 2) as u8, &i.to_le_bytes()).expect("put");
        }
        tx.commit().expect("commit");
    }

    #[test]
    fn cursor_crosses_batch_boundaries() {
        let engine = RedbEngine::in_memory().expect("engine");
        fill(&engine, "t", 25);
        fill(&engine, "u", 3);

        let tx = engine.begin_read().expect("begin read");
        let mut cursor = RedbCursor::new(&tx, "t".to_owned(), 4);
        cursor.seek_first().expect("seek");
        let mut seen = Vec::new();
        while let Some(item) = cursor.current() {
            seen.push((item.key.clone(), item.meta));
            cursor.next().expect("next");
        }
        assert_eq!(seen.len(), 25);
        for (i, (key, meta)) in seen.iter().enumerate() {
            let i = i as u32;
            assert_eq!(key, &i.to_be_bytes().to_vec());
            assert_eq!(*meta, (i % 2) as u8);
        }
        assert!(!cursor.valid());
    }

    #[test]
    fn cursor_seek_lands_on_next_key() {
        let engine = RedbEngine::in_memory().expect("engine");
        let mut tx = engine.begin_write().expect("begin write");
        for key in [b"a".as_slice(), b"c", b"e"] {
            tx.put("t", key, 0, b"").expect("put");
        }
        tx.commit().expect("commit");

        let tx = engine.begin_read().expect("begin read");
        let mut cursor = tx.cursor("t").expect("cursor");
        cursor.seek(b"b").expect("seek");
        assert_eq!(cursor.current().map(|i| i.key.as_slice()), Some(&b"c"[..]));
        cursor.seek(b"f").expect("seek");
        assert!(!cursor.valid());
    }

    #[test]
    fn empty_database_has_no_items() {
        let engine = RedbEngine::in_memory().expect("engine");
        let tx = engine.begin_read().expect("begin read");
        assert_eq!(tx.get("t", b"k").expect("get"), None);
        let mut cursor = tx.cursor("t").expect("cursor");
        cursor.seek_first().expect("seek");
        assert!(!cursor.valid());
        assert!(cursor.current().is_none());
    }

    #[test]
    fn read_only_rejects_put() {
        let engine = RedbEngine::in_memory().expect("engine");
        let mut tx = engine.begin_read().expect("begin read");
        assert!(matches!(tx.put("t", b"k", 0, b"v"), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn rollback_discards_writes() {
        let engine = RedbEngine::in_memory().expect("engine");
        let mut tx = engine.begin_write().expect("begin write");
        tx.put("t", b"k", 0, b"v").expect("put");
        tx.rollback().expect("rollback");

        let tx = engine.begin_read().expect("begin read");
        assert_eq!(tx.get("t", b"k").expect("get"), None);
    }
}

//! Tests for the Redb storage backend.

use edgeload_storage::backends::tables::names;
use edgeload_storage::backends::RedbEngine;
use edgeload_storage::{Cursor, StorageEngine, StorageError, StoredValue, Transaction};

fn put_one(engine: &RedbEngine, key: &[u8], meta: u8, value: &[u8]) {
    let mut tx = engine.begin_write().expect("failed to begin write");
    tx.put(names::POSTINGS, key, meta, value).expect("failed to put");
    tx.commit().expect("failed to commit");
}

#[test]
fn test_tagged_values_roundtrip() {
    let engine = RedbEngine::in_memory().expect("failed to create engine");

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(names::POSTINGS, b"uid-only", 1, b"\x02\x01\x00").expect("failed to put");
        tx.put(names::POSTINGS, b"empty", 0, b"").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    let tx = engine.begin_read().expect("failed to begin read");
    assert_eq!(
        tx.get(names::POSTINGS, b"uid-only").expect("failed to get"),
        Some(StoredValue { meta: 1, value: b"\x02\x01\x00".to_vec() })
    );
    assert_eq!(
        tx.get(names::POSTINGS, b"empty").expect("failed to get"),
        Some(StoredValue { meta: 0, value: Vec::new() })
    );
}

#[test]
fn test_table_isolation() {
    let engine = RedbEngine::in_memory().expect("failed to create engine");

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(names::POSTINGS, b"key", 0, b"final").expect("failed to put");
        tx.put(names::STAGED, b"key", 1, b"staged").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    let tx = engine.begin_read().expect("failed to begin read");
    let mut cursor = tx.cursor(names::STAGED).expect("failed to open cursor");
    cursor.seek_first().expect("failed to seek");
    let item = cursor.current().expect("one staged item");
    assert_eq!(item.key, b"key");
    assert_eq!(item.value, b"staged");
    cursor.next().expect("failed to advance");
    assert!(!cursor.valid());
}

#[test]
fn test_overwrite_replaces_tag() {
    let engine = RedbEngine::in_memory().expect("failed to create engine");
    put_one(&engine, b"k", 0, b"full");
    put_one(&engine, b"k", 1, b"packed");

    let tx = engine.begin_read().expect("failed to begin read");
    let stored = tx.get(names::POSTINGS, b"k").expect("failed to get").expect("present");
    assert_eq!(stored.meta, 1);
    assert_eq!(stored.value, b"packed");
}

#[test]
fn test_cursor_order_is_bytewise() {
    let engine = RedbEngine::in_memory().expect("failed to create engine");
    let keys: Vec<Vec<u8>> = vec![vec![0x01, 0xff], vec![0x01], vec![0x00, 0x05], vec![0x02]];
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        for key in &keys {
            tx.put(names::STAGED, key, 0, b"").expect("failed to put");
        }
        tx.commit().expect("failed to commit");
    }

    let tx = engine.begin_read().expect("failed to begin read");
    let mut cursor = tx.cursor(names::STAGED).expect("failed to open cursor");
    cursor.seek_first().expect("failed to seek");
    let mut seen = Vec::new();
    while let Some(item) = cursor.current() {
        seen.push(item.key.clone());
        cursor.next().expect("failed to advance");
    }

    let mut expected = keys;
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_on_disk_persistence() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("target.redb");

    {
        let engine = RedbEngine::open(&path).expect("failed to open");
        put_one(&engine, b"k", 1, b"v");
    }

    let engine = RedbEngine::open(&path).expect("failed to reopen");
    let tx = engine.begin_read().expect("failed to begin read");
    assert!(tx.get(names::POSTINGS, b"k").expect("failed to get").is_some());
}

#[test]
fn test_read_only_put_fails() {
    let engine = RedbEngine::in_memory().expect("failed to create engine");
    let mut tx = engine.begin_read().expect("failed to begin read");
    assert!(matches!(tx.put(names::POSTINGS, b"k", 0, b""), Err(StorageError::ReadOnly)));
}

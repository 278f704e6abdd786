//! End-to-end tests for the shard reduce pipeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgeload::shard::{shard_files, ShardWriter};
use edgeload::{BulkLoader, LoadError, LoaderConfig};
use edgeload_core::encoding::{decode_posting_list, META_FULL, META_UID_ONLY};
use edgeload_core::{MapEntry, Posting, PostingListValue, Uid, ValueType};
use edgeload_storage::backends::tables::names;
use edgeload_storage::backends::RedbEngine;
use edgeload_storage::{
    BatchWrite, StorageEngine, StorageError, Transaction, WriteCallback, WriteCompletion,
    WriteRequest,
};

fn write_shard(dir: &Path, name: &str, entries: &[MapEntry]) -> PathBuf {
    let path = dir.join(format!("{name}.map"));
    let mut writer = ShardWriter::create(&path).expect("failed to create shard");
    for entry in entries {
        writer.write_entry(entry).expect("failed to write entry");
    }
    writer.finish().expect("failed to finish shard");
    path
}

fn reference(key: &str, uid: u64) -> MapEntry {
    MapEntry::reference(key.as_bytes().to_vec(), Uid::new(uid))
}

fn small_config() -> LoaderConfig {
    LoaderConfig::default()
        .batch_size(4)
        .reduce_workers(3)
        .max_pending_writes(2)
        .shard_channel_capacity(8)
        .pool_capacity(64, 16, 16)
        .progress_interval(Duration::ZERO)
}

fn uids(raw: &[u64]) -> Vec<Uid> {
    raw.iter().copied().map(Uid::new).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_three_shards_merge_into_one_list_per_key() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_shard(dir.path(), "0", &[reference("a", 1), reference("c", 10), reference("e", 5)]);
    write_shard(dir.path(), "1", &[reference("b", 2), reference("c", 11), reference("f", 6)]);
    write_shard(dir.path(), "2", &[reference("c", 12), reference("d", 4)]);

    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));
    let loader = BulkLoader::for_engine(small_config().batch_size(2), Arc::clone(&engine))
        .expect("failed to create loader");
    let shards = shard_files(dir.path()).expect("failed to list shards");
    let summary = loader.reduce_shards(&shards).await.expect("reduce failed");

    assert_eq!(summary.shards, 3);
    assert_eq!(summary.progress.map_entries, 8);
    assert_eq!(summary.progress.reduce_keys, 6);
    assert_eq!(summary.progress.reduce_edges, 8);
    assert_eq!(summary.progress.pending_writes, 0);

    let tx = engine.begin_read().expect("failed to begin read");
    let c = tx.get(names::POSTINGS, b"c").expect("failed to get").expect("c missing");
    assert_eq!(c.meta, META_UID_ONLY);
    assert_eq!(
        decode_posting_list(c.meta, &c.value).expect("decode"),
        PostingListValue::UidOnly(uids(&[10, 11, 12]))
    );
    for (key, uid) in [("a", 1), ("b", 2), ("d", 4), ("e", 5), ("f", 6)] {
        let stored =
            tx.get(names::POSTINGS, key.as_bytes()).expect("failed to get").expect("missing");
        assert_eq!(
            decode_posting_list(stored.meta, &stored.value).expect("decode"),
            PostingListValue::UidOnly(uids(&[uid]))
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_value_bearing_entry_selects_full_encoding() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let value = Posting::value(Uid::new(2), ValueType::String, b"x".to_vec());
    write_shard(
        dir.path(),
        "0",
        &[reference("k", 1), MapEntry::with_posting(b"k".to_vec(), value.clone())],
    );

    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));
    let loader =
        BulkLoader::for_engine(small_config(), Arc::clone(&engine)).expect("failed to create loader");
    loader
        .reduce_shards(&shard_files(dir.path()).expect("failed to list shards"))
        .await
        .expect("reduce failed");

    let tx = engine.begin_read().expect("failed to begin read");
    let stored = tx.get(names::POSTINGS, b"k").expect("failed to get").expect("missing");
    assert_eq!(stored.meta, META_FULL);
    assert_eq!(
        decode_posting_list(stored.meta, &stored.value).expect("decode"),
        PostingListValue::Full { postings: vec![value], uids: uids(&[1, 2]) }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_shards_is_a_noop() {
    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));
    let loader = BulkLoader::for_engine(small_config(), engine).expect("failed to create loader");
    let summary = loader.reduce_shards(&[]).await.expect("reduce failed");
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.progress.reduce_keys, 0);
}

#[derive(Default)]
struct WriteLog {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    violations: AtomicUsize,
    written: Mutex<HashMap<Vec<u8>, usize>>,
    stored: Mutex<BTreeMap<Vec<u8>, (u8, Vec<u8>)>>,
}

/// Completes writes after a delay and checks that nothing it holds changes
/// while in flight.
struct InstrumentedWriter {
    log: Arc<WriteLog>,
    fail: bool,
}

impl InstrumentedWriter {
    fn new(fail: bool) -> (Self, Arc<WriteLog>) {
        let log = Arc::new(WriteLog::default());
        (Self { log: Arc::clone(&log), fail }, log)
    }
}

impl BatchWrite for InstrumentedWriter {
    fn write_batch_async(&self, requests: Vec<WriteRequest>, callback: WriteCallback) {
        let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let snapshot: Vec<(Vec<u8>, u8, Vec<u8>)> =
            requests.iter().map(|r| (r.key.clone(), r.meta, r.value.clone())).collect();
        let this = Arc::clone(&self.log);
        let fail = self.fail;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let unchanged = requests
                .iter()
                .zip(&snapshot)
                .all(|(r, (key, meta, value))| {
                    &r.key == key && r.meta == *meta && &r.value == value
                });
            if !unchanged {
                this.violations.fetch_add(1, Ordering::SeqCst);
            }
            {
                let mut written = this.written.lock().expect("lock");
                let mut stored = this.stored.lock().expect("lock");
                for (key, meta, value) in snapshot {
                    *written.entry(key.clone()).or_default() += 1;
                    stored.insert(key, (meta, value));
                }
            }
            let result = if fail { Err(StorageError::ReadOnly) } else { Ok(()) };
            this.in_flight.fetch_sub(1, Ordering::SeqCst);
            callback(WriteCompletion { requests, result });
        });
    }
}

/// Shards where every key appears in several shards with distinct UIDs.
fn overlapping_shards(dir: &Path, shards: u64, keys: u64) -> BTreeMap<Vec<u8>, BTreeSet<u64>> {
    let mut expected: BTreeMap<Vec<u8>, BTreeSet<u64>> = BTreeMap::new();
    for shard in 0..shards {
        let mut entries = Vec::new();
        for k in (shard..keys).step_by(2) {
            let key = format!("key{k:04}").into_bytes();
            for j in 0..3 {
                let uid = k * 100 + shard * 10 + j;
                expected.entry(key.clone()).or_default().insert(uid);
                entries.push(MapEntry::reference(key.clone(), Uid::new(uid)));
            }
        }
        write_shard(dir, &shard.to_string(), &entries);
    }
    expected
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pool_buffers_are_not_reused_while_in_flight() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let expected = overlapping_shards(dir.path(), 4, 60);

    let (writer, log) = InstrumentedWriter::new(false);
    let loader = BulkLoader::new(small_config(), writer);
    let summary = loader
        .reduce_shards(&shard_files(dir.path()).expect("failed to list shards"))
        .await
        .expect("reduce failed");

    assert_eq!(log.violations.load(Ordering::SeqCst), 0);
    assert!(log.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(log.in_flight.load(Ordering::SeqCst), 0);
    assert!(summary.batches > 1);

    // Each key is written exactly once, so no key was split across batches.
    let written = log.written.lock().expect("lock");
    assert_eq!(written.len(), expected.len());
    assert!(written.values().all(|&n| n == 1));

    let stored = log.stored.lock().expect("lock");
    for (key, want) in &expected {
        let (meta, value) = stored.get(key).expect("key missing");
        let got = decode_posting_list(*meta, value).expect("decode");
        let want: Vec<Uid> = want.iter().copied().map(Uid::new).collect();
        assert_eq!(got.uids(), want.as_slice());
    }

    // Pooled objects were recycled rather than reallocated for every batch.
    assert!(loader.pools().requests.stats().reused > 0);
}

#[test]
fn test_more_shards_than_blocking_threads() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let expected = overlapping_shards(dir.path(), 8, 40);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(2)
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));

    let summary = runtime.block_on(async {
        let config = small_config().shard_channel_capacity(1);
        let loader = BulkLoader::for_engine(config, Arc::clone(&engine))
            .expect("failed to create loader");
        let shards = shard_files(dir.path()).expect("failed to list shards");
        tokio::time::timeout(Duration::from_secs(30), loader.reduce_shards(&shards))
            .await
            .expect("reduce stalled")
            .expect("reduce failed")
    });
    assert_eq!(summary.shards, 8);

    let tx = engine.begin_read().expect("failed to begin read");
    for (key, want) in &expected {
        let stored = tx.get(names::POSTINGS, key).expect("failed to get").expect("key missing");
        let got = decode_posting_list(stored.meta, &stored.value).expect("failed to decode");
        let want: Vec<Uid> = want.iter().copied().map(Uid::new).collect();
        assert_eq!(got.uids(), want.as_slice());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_write_failure_fails_the_load() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    overlapping_shards(dir.path(), 2, 20);

    let (writer, log) = InstrumentedWriter::new(true);
    let loader = BulkLoader::new(small_config(), writer);
    let result = loader.reduce_shards(&shard_files(dir.path()).expect("failed to list shards")).await;

    assert!(matches!(result, Err(LoadError::Storage(StorageError::ReadOnly))));
    assert_eq!(log.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_corrupt_shard_fails_the_load() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    overlapping_shards(dir.path(), 2, 20);
    // A frame that claims 100 bytes but holds 3.
    std::fs::write(dir.path().join("9.map"), [100u8, 1, 2, 3]).expect("failed to write shard");

    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));
    let loader = BulkLoader::for_engine(small_config(), engine).expect("failed to create loader");
    let err = loader
        .reduce_shards(&shard_files(dir.path()).expect("failed to list shards"))
        .await
        .expect_err("corrupt shard must fail");
    assert!(matches!(err, LoadError::ShardIo { .. }), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_config_is_rejected() {
    let engine = Arc::new(RedbEngine::in_memory().expect("failed to create engine"));
    let loader = BulkLoader::for_engine(LoaderConfig::default().batch_size(0), engine)
        .expect("failed to create loader");
    assert!(matches!(loader.reduce_shards(&[]).await, Err(LoadError::Config(_))));
}

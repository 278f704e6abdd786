//! Posting-list assembly and bounded asynchronous writes.

use std::sync::Arc;

use edgeload_core::encoding::PostingListBuilder;
use edgeload_core::MapEntry;
use edgeload_storage::{BatchWrite, WriteCompletion, WriteRequest};
use tokio::sync::Semaphore;

use crate::error::{FatalSlot, LoadError, Result};
use crate::pool::Pools;
use crate::progress::Progress;

/// Turns batches into posting-list writes.
///
/// Each reducer owns its builder; the pools, the write gate and the fatal
/// slot are shared by all reducers of a load.
pub struct Reducer<W: BatchWrite> {
    writer: Arc<W>,
    pools: Arc<Pools>,
    progress: Arc<Progress>,
    fatal: Arc<FatalSlot>,
    gate: Arc<Semaphore>,
    builder: PostingListBuilder,
}

impl<W: BatchWrite> Reducer<W> {
    /// Create a reducer.
    pub fn new(
        writer: Arc<W>,
        pools: Arc<Pools>,
        progress: Arc<Progress>,
        fatal: Arc<FatalSlot>,
        gate: Arc<Semaphore>,
    ) -> Self {
        Self { writer, pools, progress, fatal, gate, builder: PostingListBuilder::new() }
    }

    /// Encode one write request per run of equal keys in `batch`.
    ///
    /// Postings are moved out of the entries; the entries themselves stay
    /// in `batch` so they can be pooled once the write completes.
    ///
    /// # Errors
    ///
    /// Returns an error if a posting fails validation.
    pub fn encode_batch(&mut self, batch: &mut [MapEntry]) -> Result<Vec<WriteRequest>> {
        let pools = &self.pools;
        let mut requests = Vec::new();
        for run in batch.chunk_by_mut(|a, b| a.key == b.key) {
            for entry in run.iter_mut() {
                self.builder.add_entry(entry);
            }
            let encoded = self.builder.finish(|len| pools.value_buffer(len))?;

            let mut request = pools.requests.get();
            request.key.extend_from_slice(&run[0].key);
            request.meta = encoded.meta;
            request.value = encoded.value;
            requests.push(request);

            self.progress.add_reduced(1, run.len() as u64);
        }
        Ok(requests)
    }

    /// Encode `batch` and issue its write.
    ///
    /// Waits for a write slot when the configured number of writes is
    /// already outstanding. Returns once the write is issued; its outcome
    /// arrives through the completion callback, which records any failure in
    /// the fatal slot and returns every pooled object.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the write gate was closed.
    pub async fn reduce(&mut self, mut batch: Vec<MapEntry>) -> Result<()> {
        let requests = self.encode_batch(&mut batch)?;

        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| LoadError::ChannelClosed("write gate"))?;
        self.progress.write_started();

        let pools = Arc::clone(&self.pools);
        let progress = Arc::clone(&self.progress);
        let fatal = Arc::clone(&self.fatal);
        self.writer.write_batch_async(
            requests,
            Box::new(move |done: WriteCompletion| {
                let WriteCompletion { mut requests, result } = done;
                let failure = match result {
                    Err(e) => Some(e),
                    Ok(()) => requests.iter_mut().find_map(|r| r.error.take()),
                };
                if let Some(e) = failure {
                    fatal.set(LoadError::Storage(e));
                }
                for request in requests {
                    pools.release_request(request);
                }
                pools.entries.put_all(batch);
                progress.write_finished();
                drop(permit);
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use edgeload_core::encoding::{decode_posting_list, META_FULL, META_UID_ONLY};
    use edgeload_core::{Posting, PostingKind, PostingListValue, Uid, ValueType};
    use edgeload_storage::{StorageError, WriteCallback};

    use super::*;
    use crate::config::LoaderConfig;

    /// Completes every batch immediately, recording what was written.
    #[derive(Default)]
    struct Recorder {
        written: Mutex<Vec<(Vec<u8>, u8, Vec<u8>)>>,
        fail: bool,
    }

    impl BatchWrite for Recorder {
        fn write_batch_async(&self, requests: Vec<WriteRequest>, callback: WriteCallback) {
            let mut written = self.written.lock().expect("lock");
            for r in &requests {
                written.push((r.key.clone(), r.meta, r.value.clone()));
            }
            let result = if self.fail { Err(StorageError::ReadOnly) } else { Ok(()) };
            callback(WriteCompletion { requests, result });
        }
    }

    fn reducer(writer: Arc<Recorder>) -> (Reducer<Recorder>, Arc<Pools>, Arc<FatalSlot>) {
        let pools = Arc::new(Pools::new(&LoaderConfig::default()));
        let fatal = Arc::new(FatalSlot::new());
        let reducer = Reducer::new(
            writer,
            Arc::clone(&pools),
            Arc::new(Progress::new()),
            Arc::clone(&fatal),
            Arc::new(Semaphore::new(2)),
        );
        (reducer, pools, fatal)
    }

    #[tokio::test]
    async fn one_request_per_key() {
        let writer = Arc::new(Recorder::default());
        let (mut reducer, pools, fatal) = reducer(Arc::clone(&writer));

        let batch = vec![
            MapEntry::reference(b"a".to_vec(), Uid::new(3)),
            MapEntry::reference(b"a".to_vec(), Uid::new(1)),
            MapEntry::reference(b"b".to_vec(), Uid::new(1)),
            MapEntry::with_posting(
                b"b".to_vec(),
                Posting::value(Uid::new(2), ValueType::String, b"x".to_vec()),
            ),
        ];
        reducer.reduce(batch).await.expect("reduce");

        let written = writer.written.lock().expect("lock").clone();
        assert_eq!(written.len(), 2);

        let (key, meta, value) = &written[0];
        assert_eq!(key, b"a");
        assert_eq!(*meta, META_UID_ONLY);
        assert_eq!(
            decode_posting_list(*meta, value).expect("decode"),
            PostingListValue::UidOnly(vec![Uid::new(1), Uid::new(3)])
        );

        let (key, meta, value) = &written[1];
        assert_eq!(key, b"b");
        assert_eq!(*meta, META_FULL);
        let decoded = decode_posting_list(*meta, value).expect("decode");
        assert_eq!(decoded.uids(), &[Uid::new(1), Uid::new(2)]);
        assert_eq!(decoded.postings().len(), 1);

        assert!(!fatal.is_set());
        assert_eq!(pools.entries.idle(), 4);
        assert_eq!(pools.requests.idle(), 2);
        assert_eq!(pools.buffers.idle(), 2);
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let writer = Arc::new(Recorder { fail: true, ..Recorder::default() });
        let (mut reducer, pools, fatal) = reducer(writer);
        reducer
            .reduce(vec![MapEntry::reference(b"a".to_vec(), Uid::new(1))])
            .await
            .expect("issue");
        assert!(matches!(fatal.take(), Some(LoadError::Storage(StorageError::ReadOnly))));
        // Pooled objects come back even on failure.
        assert_eq!(pools.requests.idle(), 1);
    }

    #[tokio::test]
    async fn invalid_posting_fails_encoding() {
        let writer = Arc::new(Recorder::default());
        let (mut reducer, _, _) = reducer(Arc::clone(&writer));
        let mut bad = Posting::value(Uid::new(1), ValueType::String, b"x".to_vec());
        bad.kind = PostingKind::ValueLang;
        let result = reducer.reduce(vec![MapEntry::with_posting(b"a".to_vec(), bad)]).await;
        assert!(matches!(result, Err(LoadError::Core(_))));
        assert!(writer.written.lock().expect("lock").is_empty());
    }
}

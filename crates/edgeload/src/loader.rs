//! Orchestration of the shard reduce pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use edgeload_core::MapEntry;
use edgeload_storage::backends::tables::names;
use edgeload_storage::{AsyncWriter, BatchWrite, StorageEngine};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::batch::Batcher;
use crate::config::LoaderConfig;
use crate::error::{FatalSlot, LoadError, Result};
use crate::merge::{merge_by_key, ChannelSource};
use crate::pool::Pools;
use crate::progress::{Progress, ProgressReporter, ProgressSnapshot};
use crate::reduce::Reducer;
use crate::shard::read_shard;

/// Outcome of a completed reduce.
#[derive(Debug, Clone, Serialize)]
pub struct ReduceSummary {
    /// Number of shards merged.
    pub shards: usize,
    /// Number of batches handed to the reducers.
    pub batches: u64,
    /// Final counters.
    pub progress: ProgressSnapshot,
}

/// Reduces sorted map shards into posting lists.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use edgeload::{BulkLoader, LoaderConfig};
/// use edgeload::shard::shard_files;
/// use edgeload_storage::backends::RedbEngine;
///
/// let engine = Arc::new(RedbEngine::open("out.redb")?);
/// let loader = BulkLoader::for_engine(LoaderConfig::default(), engine)?;
/// let summary = loader.reduce_shards(&shard_files("map".as_ref())?).await?;
/// ```
pub struct BulkLoader<W: BatchWrite> {
    config: LoaderConfig,
    writer: Arc<W>,
    pools: Arc<Pools>,
    progress: Arc<Progress>,
    fatal: Arc<FatalSlot>,
}

impl<E: StorageEngine + 'static> BulkLoader<AsyncWriter<E>> {
    /// Create a loader writing to the postings table of `engine`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn for_engine(config: LoaderConfig, engine: Arc<E>) -> Result<Self> {
        let writer = AsyncWriter::new(engine, names::POSTINGS)?;
        Ok(Self::new(config, writer))
    }
}

impl<W: BatchWrite> BulkLoader<W> {
    /// Create a loader around `writer`.
    pub fn new(config: LoaderConfig, writer: W) -> Self {
        Self::from_shared(config, Arc::new(writer))
    }

    /// Create a loader around a shared writer.
    pub fn from_shared(config: LoaderConfig, writer: Arc<W>) -> Self {
        let pools = Arc::new(Pools::new(&config));
        Self {
            config,
            writer,
            pools,
            progress: Arc::new(Progress::new()),
            fatal: Arc::new(FatalSlot::new()),
        }
    }

    /// The live counters of this loader.
    #[must_use]
    pub fn progress(&self) -> &Arc<Progress> {
        &self.progress
    }

    /// The object pools of this loader.
    #[must_use]
    pub fn pools(&self) -> &Arc<Pools> {
        &self.pools
    }

    /// Merge `shards`, reduce every key into one posting list and write it.
    ///
    /// Returns once every issued write has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns the first error from any stage: a shard that cannot be read
    /// or decoded, a posting that cannot be encoded or a failed write.
    pub async fn reduce_shards(&self, shards: &[PathBuf]) -> Result<ReduceSummary> {
        self.config.validate()?;
        let permits = u32::try_from(self.config.max_pending_writes)
            .map_err(|_| LoadError::Config("max_pending_writes does not fit in u32".to_owned()))?;

        info!(
            shards = shards.len(),
            workers = self.config.reduce_workers,
            batch_size = self.config.batch_size,
            max_pending_writes = permits,
            "starting reduce"
        );
        let reporter =
            ProgressReporter::spawn(Arc::clone(&self.progress), self.config.progress_interval);
        let gate = Arc::new(Semaphore::new(self.config.max_pending_writes));

        let batches = self.run(shards, &gate).await;

        // Every write slot free means every callback has run.
        let drained = gate.acquire_many(permits).await;
        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        drained.map_err(|_| LoadError::ChannelClosed("write gate"))?;

        if let Some(err) = self.fatal.take() {
            return Err(err);
        }
        let summary = ReduceSummary {
            shards: shards.len(),
            batches,
            progress: self.progress.snapshot(),
        };
        info!(
            batches = summary.batches,
            keys = summary.progress.reduce_keys,
            edges = summary.progress.reduce_edges,
            elapsed_secs = summary.progress.elapsed_secs,
            "reduce finished"
        );
        Ok(summary)
    }

    async fn run(&self, shards: &[PathBuf], gate: &Arc<Semaphore>) -> u64 {
        let mut sources = Vec::with_capacity(shards.len());
        let mut senders = Vec::with_capacity(shards.len());
        for _ in shards {
            let (tx, rx) = mpsc::channel(self.config.shard_channel_capacity);
            sources.push(ChannelSource::new(rx));
            senders.push(tx);
        }

        let (batch_tx, batch_rx) = mpsc::channel(self.config.batch_channel_capacity);
        let merger = match self.spawn_merger(sources, batch_tx) {
            Ok(merger) => Some(merger),
            Err(e) => {
                self.fatal.set(e);
                None
            }
        };

        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let workers: Vec<_> = (0..self.config.reduce_workers)
            .map(|id| self.spawn_worker(id, Arc::clone(&batch_rx), Arc::clone(gate)))
            .collect();

        let mut readers = Vec::with_capacity(shards.len());
        for (index, (path, tx)) in shards.iter().zip(senders).enumerate() {
            match self.spawn_reader(index, path.clone(), tx) {
                Ok(reader) => readers.push(reader),
                Err(e) => {
                    // Dropping the remaining senders ends their merge sources.
                    self.fatal.set(e);
                    break;
                }
            }
        }

        for reader in readers {
            self.wait(reader).await;
        }
        let batches = match merger {
            Some(merger) => self.wait(merger).await.unwrap_or(0),
            None => 0,
        };
        for worker in workers {
            self.join(worker).await;
        }
        batches
    }

    fn spawn_reader(
        &self,
        index: usize,
        path: PathBuf,
        tx: mpsc::Sender<MapEntry>,
    ) -> Result<oneshot::Receiver<()>> {
        let buffer_size = self.config.read_buffer_size;
        let pools = Arc::clone(&self.pools);
        let progress = Arc::clone(&self.progress);
        let fatal = Arc::clone(&self.fatal);
        spawn_thread(format!("edgeload-shard-{index}"), move || {
            if let Err(e) = read_shard(&path, buffer_size, tx, &pools, &progress, &fatal) {
                fatal.set(e);
            }
        })
    }

    fn spawn_merger(
        &self,
        sources: Vec<ChannelSource>,
        batch_tx: mpsc::Sender<Vec<MapEntry>>,
    ) -> Result<oneshot::Receiver<u64>> {
        let batch_size = self.config.batch_size;
        let pools = Arc::clone(&self.pools);
        let progress = Arc::clone(&self.progress);
        let fatal = Arc::clone(&self.fatal);
        spawn_thread("edgeload-merge".to_owned(), move || {
            let mut queued = 0;
            let mut entries = 0;
            for batch in Batcher::new(merge_by_key(sources), batch_size) {
                if fatal.is_set() {
                    pools.entries.put_all(batch);
                    break;
                }
                progress.job_queued();
                let len = batch.len();
                if batch_tx.blocking_send(batch).is_err() {
                    fatal.set(LoadError::ChannelClosed("batch"));
                    break;
                }
                queued += 1;
                entries += len;
            }
            info!(entries, batches = queued, "merge finished");
            queued
        })
    }

    fn spawn_worker(
        &self,
        id: usize,
        batches: Arc<Mutex<mpsc::Receiver<Vec<MapEntry>>>>,
        gate: Arc<Semaphore>,
    ) -> JoinHandle<()> {
        let pools = Arc::clone(&self.pools);
        let fatal = Arc::clone(&self.fatal);
        let mut reducer = Reducer::new(
            Arc::clone(&self.writer),
            Arc::clone(&self.pools),
            Arc::clone(&self.progress),
            Arc::clone(&self.fatal),
            gate,
        );
        tokio::spawn(async move {
            loop {
                let next = batches.lock().await.recv().await;
                let Some(batch) = next else { break };
                // Keep draining after a failure so the merge never blocks.
                if fatal.is_set() {
                    pools.entries.put_all(batch);
                    continue;
                }
                if let Err(e) = reducer.reduce(batch).await {
                    fatal.set(e);
                }
            }
            debug!(worker = id, "reduce worker finished");
        })
    }

    async fn wait<T>(&self, done: oneshot::Receiver<T>) -> Option<T> {
        match done.await {
            Ok(value) => Some(value),
            Err(_) => {
                self.fatal.set(LoadError::Task("pipeline thread exited without finishing".to_owned()));
                None
            }
        }
    }

    async fn join<T>(&self, handle: JoinHandle<T>) -> Option<T> {
        match handle.await {
            Ok(value) => Some(value),
            Err(e) => {
                self.fatal.set(LoadError::Task(e.to_string()));
                None
            }
        }
    }
}

/// Run `f` on a dedicated named thread.
///
/// Shard decoding and the merge block on channels for their whole run and
/// must not hold slots of the runtime's blocking pool, which the batch
/// writes use. The receiver yields the result, or an error if the thread
/// panicked.
fn spawn_thread<T, F>(name: String, f: F) -> Result<oneshot::Receiver<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new().name(name).spawn(move || {
        let _ = done_tx.send(f());
    })?;
    Ok(done_rx)
}

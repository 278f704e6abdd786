//! Staged posting-list construction.
//!
//! Postings are first written one by one to a scratch store under
//! `posting-list key ‖ uid`, so the store's key order groups them by list
//! and sorts each list by UID. A second pass walks the store, assembles one
//! posting list per key and writes it, together with the count indices of
//! attributes that have them enabled, to a target.

use std::path::Path;

use edgeload_core::encoding::keys::{split_staged_key, staged_key_into, ParsedKey};
use edgeload_core::encoding::{Decoder, Encoder, PostingListBuilder, META_FULL, META_UID_ONLY};
use edgeload_core::{CoreError, Posting};
use edgeload_storage::backends::tables::names;
use edgeload_storage::backends::{RedbConfig, RedbEngine};
use edgeload_storage::{Cursor, KvItem, StorageEngine, StorageError, Transaction};
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::count::{CountIndex, IndexSink};
use crate::error::Result;
use crate::schema::SchemaLookup;

const STORE_FILE: &str = "staged.redb";

/// Outcome of [`StagedBuilder::build_posting_lists`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagedSummary {
    /// Postings read back from the scratch store.
    pub postings: u64,
    /// Posting lists written.
    pub posting_lists: u64,
    /// Count index keys written, empty ones included.
    pub count_keys: u64,
    /// Distinct attributes seen.
    pub attributes: u64,
}

/// Scratch store of individual postings.
///
/// The store lives in a fresh temporary directory, commits without fsync
/// and is deleted by [`cleanup`](Self::cleanup) or on drop.
pub struct StagedBuilder {
    // Closed before the directory is removed.
    store: RedbEngine,
    dir: TempDir,
    pending: Vec<KvItem>,
    commit_every: usize,
    staged: u64,
}

impl StagedBuilder {
    /// Create a builder in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or store cannot be created.
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("edgeload-staged-").tempdir()?;
        Self::with_dir(dir, config)
    }

    /// Create a builder in a temporary directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or store cannot be created.
    pub fn in_dir(parent: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("edgeload-staged-").tempdir_in(parent)?;
        Self::with_dir(dir, config)
    }

    fn with_dir(dir: TempDir, config: &LoaderConfig) -> Result<Self> {
        config.validate()?;
        let store = RedbEngine::open_with_config(
            dir.path().join(STORE_FILE),
            RedbConfig::new().durable(false),
        )?;
        debug!(dir = %dir.path().display(), "opened staged store");
        Ok(Self {
            store,
            dir,
            pending: Vec::with_capacity(config.staged_commit_every),
            commit_every: config.staged_commit_every,
            staged: 0,
        })
    }

    /// Directory holding the scratch store.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of postings added so far.
    #[must_use]
    pub const fn staged(&self) -> u64 {
        self.staged
    }

    /// Stage one posting of the list stored under `key`.
    ///
    /// References are stored with an empty value, everything else as its
    /// encoded posting. A second posting with the same key and UID replaces
    /// the first.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the posting is invalid or the
    /// store write fails.
    pub fn add_posting(&mut self, key: &[u8], posting: &Posting) -> Result<()> {
        if key.is_empty() {
            return Err(CoreError::InvalidKey("empty posting list key".to_owned()).into());
        }
        posting.validate()?;
        let mut item = KvItem::default();
        staged_key_into(key, posting.uid, &mut item.key);
        if posting.is_value_bearing() {
            item.meta = META_FULL;
            item.value = posting.encode()?;
        } else {
            item.meta = META_UID_ONLY;
        }
        self.pending.push(item);
        self.staged += 1;
        if self.pending.len() >= self.commit_every {
            self.commit_pending()?;
        }
        Ok(())
    }

    fn commit_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut tx = self.store.begin_write()?;
        for item in &self.pending {
            tx.put(names::STAGED, &item.key, item.meta, &item.value)?;
        }
        tx.commit()?;
        self.pending.clear();
        Ok(())
    }

    /// Assemble every staged posting list and write it to `target`.
    ///
    /// Attributes for which `schema` enables counts also get a dense run of
    /// count keys, forward for data lists and reverse for reverse lists.
    ///
    /// # Errors
    ///
    /// Returns the first store, decode or target error.
    pub fn build_posting_lists(
        &mut self,
        target: &mut dyn IndexSink,
        schema: &dyn SchemaLookup,
    ) -> Result<StagedSummary> {
        self.commit_pending()?;

        let tx = self.store.begin_read()?;
        let mut cursor = tx.cursor(names::STAGED)?;
        cursor.seek_first()?;

        let mut assembly = Assembly::new(target, schema);
        while let Some(item) = cursor.current() {
            let (pl_key, uid) = split_staged_key(&item.key)?;
            if pl_key != assembly.key.as_slice() {
                assembly.finish_list()?;
                assembly.key.extend_from_slice(pl_key);
            }
            match item.meta {
                META_UID_ONLY => assembly.builder.add_uid(uid),
                META_FULL => assembly.builder.add_posting(Posting::decode(&item.value)?),
                other => {
                    return Err(StorageError::Corrupt(format!("staged value tag {other:#04x}")).into());
                }
            }
            assembly.summary.postings += 1;
            cursor.next()?;
        }
        let summary = assembly.finish()?;

        info!(
            postings = summary.postings,
            posting_lists = summary.posting_lists,
            count_keys = summary.count_keys,
            attributes = summary.attributes,
            "staged build finished"
        );
        Ok(summary)
    }

    /// Close the store and delete its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn cleanup(self) -> Result<()> {
        let Self { store, dir, .. } = self;
        drop(store);
        dir.close()?;
        Ok(())
    }
}

/// State of the second pass: the list being assembled and the counts of
/// the current attribute.
struct Assembly<'a> {
    target: &'a mut dyn IndexSink,
    schema: &'a dyn SchemaLookup,
    key: Vec<u8>,
    builder: PostingListBuilder,
    counts: CountIndex,
    attr: Option<String>,
    summary: StagedSummary,
}

impl<'a> Assembly<'a> {
    fn new(target: &'a mut dyn IndexSink, schema: &'a dyn SchemaLookup) -> Self {
        Self {
            target,
            schema,
            key: Vec::new(),
            builder: PostingListBuilder::new(),
            counts: CountIndex::new(),
            attr: None,
            summary: StagedSummary::default(),
        }
    }

    /// Write the list under `self.key`, if any, and clear the key.
    fn finish_list(&mut self) -> Result<()> {
        if self.builder.is_empty() {
            self.key.clear();
            return Ok(());
        }
        let encoded = self.builder.finish(Vec::with_capacity)?;
        let parsed = ParsedKey::parse(&self.key)?;

        if self.attr.as_deref() != Some(parsed.attr.as_str()) {
            self.flush_counts()?;
            self.attr = Some(parsed.attr.clone());
            self.summary.attributes += 1;
        }

        self.target.put(&self.key, encoded.meta, &encoded.value)?;
        self.summary.posting_lists += 1;

        if (parsed.is_data() || parsed.is_reverse()) && self.schema.count_enabled(&parsed.attr) {
            if let Some(uid) = parsed.uid {
                self.counts.record(encoded.uid_count, uid.as_u64(), parsed.is_reverse())?;
            }
        }
        self.key.clear();
        Ok(())
    }

    fn flush_counts(&mut self) -> Result<()> {
        if let Some(attr) = self.attr.as_deref() {
            let written = self.counts.flush(attr, &mut *self.target)?;
            self.summary.count_keys += written as u64;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<StagedSummary> {
        self.finish_list()?;
        self.flush_counts()?;
        Ok(self.summary)
    }
}

/// Writes assembled keys to a table of a storage engine, committing every
/// `commit_every` puts.
pub struct TargetWriter<'a, E: StorageEngine + 'a> {
    engine: &'a E,
    table: &'a str,
    tx: Option<E::Transaction<'a>>,
    in_tx: usize,
    commit_every: usize,
    written: u64,
}

impl<'a, E: StorageEngine + 'a> TargetWriter<'a, E> {
    /// Write to the postings table of `engine`.
    #[must_use]
    pub fn new(engine: &'a E, config: &LoaderConfig) -> Self {
        Self::for_table(engine, names::POSTINGS, config.staged_commit_every)
    }

    /// Write to `table`, committing every `commit_every` puts.
    #[must_use]
    pub fn for_table(engine: &'a E, table: &'a str, commit_every: usize) -> Self {
        Self { engine, table, tx: None, in_tx: 0, commit_every: commit_every.max(1), written: 0 }
    }

    /// Commit outstanding puts. Returns the total number of puts.
    ///
    /// Puts not followed by `finish` are rolled back when the writer drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the final commit fails.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(tx) = self.tx.take() {
            tx.commit()?;
        }
        Ok(self.written)
    }
}

impl<'a, E: StorageEngine + 'a> IndexSink for TargetWriter<'a, E> {
    fn put(&mut self, key: &[u8], meta: u8, value: &[u8]) -> Result<()> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.engine.begin_write()?,
        };
        let tx = self.tx.insert(tx);
        tx.put(self.table, key, meta, value)?;
        self.in_tx += 1;
        self.written += 1;
        if self.in_tx >= self.commit_every {
            if let Some(tx) = self.tx.take() {
                tx.commit()?;
            }
            self.in_tx = 0;
        }
        Ok(())
    }
}

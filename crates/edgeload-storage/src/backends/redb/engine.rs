//! The redb-backed [`StorageEngine`].

use std::path::Path;

use redb::{Database, Durability};

use crate::engine::{StorageEngine, StorageError};

use super::transaction::RedbTransaction;

/// Options applied when a redb database is opened.
#[derive(Debug, Clone, Copy)]
pub struct RedbConfig {
    /// Page cache size in bytes. `None` keeps redb's default.
    pub cache_size: Option<usize>,

    /// Whether commits are flushed to disk.
    ///
    /// Non-durable commits are visible to later transactions but may be lost
    /// on a crash. Scratch stores that are rebuilt from scratch on failure
    /// run non-durable.
    pub durable: bool,
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self { cache_size: None, durable: true }
    }
}

impl RedbConfig {
    /// Durable commits and redb's default cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page cache size in bytes.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Set whether commits are durable.
    #[must_use]
    pub const fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }
}

/// A single redb database file, or an in-memory database for tests.
pub struct RedbEngine {
    db: Database,
    durable: bool,
}

impl RedbEngine {
    /// Open `path`, creating the file if needed, with durable commits.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Open `path`, creating the file if needed, with `config` applied.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: RedbConfig,
    ) -> Result<Self, StorageError> {
        let mut builder = Database::builder();

        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }

        let db = builder.create(path.as_ref()).map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self { db, durable: config.durable })
    }

    /// A database that lives only as long as the engine.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self { db, durable: true })
    }

    /// Returns true if write transactions commit durably.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.durable
    }
}

impl StorageEngine for RedbEngine {
    type Transaction<'a> = RedbTransaction;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let tx = self.db.begin_read().map_err(StorageError::transaction)?;
        Ok(RedbTransaction::new_read(tx))
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let mut tx = self.db.begin_write().map_err(StorageError::transaction)?;
        if !self.durable {
            tx.set_durability(Durability::None);
        }
        Ok(RedbTransaction::new_write(tx))
    }
}

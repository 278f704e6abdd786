//! Shard files: framed sequences of encoded map entries.
//!
//! ```text
//! [len: varint][MapEntry bytes; len] [len: varint][MapEntry bytes; len] ...
//! ```
//!
//! Entries within a shard are sorted by key. End of file between frames is
//! a clean end; anywhere else it is a truncated shard.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use edgeload_core::encoding::varint::{encode_varint, read_varint};
use edgeload_core::encoding::Encoder;
use edgeload_core::{CoreError, MapEntry};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{FatalSlot, LoadError, Result};
use crate::pool::Pools;
use crate::progress::Progress;

/// File extension of shard files.
pub const SHARD_EXTENSION: &str = "map";

/// Upper bound on a single frame, to reject corrupt length headers before
/// allocating.
pub const MAX_FRAME_LEN: u64 = 1 << 30;

/// List the shard files of a directory in name order.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn shard_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SHARD_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Writes entries as length-prefixed frames.
pub struct ShardWriter<W: Write> {
    inner: BufWriter<W>,
    scratch: Vec<u8>,
    records: u64,
}

impl ShardWriter<File> {
    /// Create a shard file, truncating any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|source| LoadError::ShardIo { path: path.to_path_buf(), source })?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ShardWriter<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { inner: BufWriter::new(writer), scratch: Vec::new(), records: 0 }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded or written.
    pub fn write_entry(&mut self, entry: &MapEntry) -> Result<()> {
        self.scratch.clear();
        encode_varint(entry.encoded_len() as u64, &mut self.scratch);
        entry.encode_to(&mut self.scratch)?;
        self.inner.write_all(&self.scratch)?;
        self.records += 1;
        Ok(())
    }

    /// Flush and return the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn finish(mut self) -> Result<u64> {
        self.inner.flush()?;
        Ok(self.records)
    }
}

/// Reads length-prefixed frames back into entries.
pub struct ShardReader<R: Read> {
    inner: BufReader<R>,
    path: PathBuf,
    scratch: Vec<u8>,
    records: u64,
    bytes: u64,
}

impl ShardReader<File> {
    /// Open a shard file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShardIo`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| LoadError::ShardIo { path: path.to_path_buf(), source })?;
        Ok(Self::with_capacity(file, path, buffer_size))
    }
}

impl<R: Read> ShardReader<R> {
    /// Wrap a reader. `path` names the source in errors.
    pub fn with_capacity(reader: R, path: impl Into<PathBuf>, buffer_size: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(buffer_size, reader),
            path: path.into(),
            scratch: Vec::new(),
            records: 0,
            bytes: 0,
        }
    }

    /// Decode the next frame into `entry`.
    ///
    /// Returns `Ok(false)` at a clean end of file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShardIo`] on read failure or truncation and
    /// [`LoadError::ShardRecord`] if a frame does not decode.
    pub fn read_into(&mut self, entry: &mut MapEntry) -> Result<bool> {
        let io_err = |path: &Path, source: std::io::Error| LoadError::ShardIo {
            path: path.to_path_buf(),
            source,
        };

        let Some(len) = read_varint(&mut self.inner).map_err(|e| io_err(&self.path, e))? else {
            return Ok(false);
        };
        if len > MAX_FRAME_LEN {
            return Err(self.record_error(CoreError::Encoding(format!(
                "frame length {len} exceeds {MAX_FRAME_LEN}"
            ))));
        }
        // Bounded by MAX_FRAME_LEN above.
        let len = len as usize;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        self.inner.read_exact(&mut self.scratch[..len]).map_err(|e| io_err(&self.path, e))?;

        if let Err(e) = entry.decode_into(&self.scratch[..len]) {
            return Err(self.record_error(e));
        }
        self.records += 1;
        self.bytes += len as u64;
        Ok(true)
    }

    /// Entries read so far.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Payload bytes read so far, excluding frame headers.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    fn record_error(&self, source: CoreError) -> LoadError {
        LoadError::ShardRecord { path: self.path.clone(), record: self.records, source }
    }
}

impl<R: Read> Iterator for ShardReader<R> {
    type Item = Result<MapEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut entry = MapEntry::default();
        match self.read_into(&mut entry) {
            Ok(true) => Some(Ok(entry)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Counts of one decoded shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Entries decoded.
    pub records: u64,
    /// Payload bytes decoded.
    pub bytes: u64,
}

/// Decode a shard into `tx`, one pooled entry per frame.
///
/// Blocks on the channel, so it must run outside the async runtime. The channel
/// closes when this returns.
///
/// # Errors
///
/// Returns the first read or decode error, [`LoadError::Aborted`] if another
/// stage failed, or [`LoadError::ChannelClosed`] if the merge stopped.
pub fn read_shard(
    path: &Path,
    buffer_size: usize,
    tx: mpsc::Sender<MapEntry>,
    pools: &Pools,
    progress: &Progress,
    fatal: &FatalSlot,
) -> Result<ShardStats> {
    let mut reader = ShardReader::open(path, buffer_size)?;
    debug!(shard = %path.display(), "decoding shard");

    loop {
        fatal.check()?;
        let mut entry = pools.entries.get();
        if !reader.read_into(&mut entry)? {
            pools.entries.put(entry);
            break;
        }
        progress.add_map_entries(1);
        if tx.blocking_send(entry).is_err() {
            return Err(LoadError::ChannelClosed("shard entry"));
        }
    }

    let stats = ShardStats { records: reader.records(), bytes: reader.bytes() };
    info!(shard = %path.display(), entries = stats.records, bytes = stats.bytes, "finished shard");
    Ok(stats)
}

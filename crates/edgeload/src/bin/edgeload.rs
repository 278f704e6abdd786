//! Edgeload command line.
//!
//! Builds posting lists from the sorted shard files of a map phase.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgeload::shard::{shard_files, ShardReader};
use edgeload::{BulkLoader, LoaderConfig, Schema, StagedBuilder, TargetWriter};
use edgeload_core::{MapEntry, Posting};
use edgeload_storage::backends::RedbEngine;
use tracing::info;

#[derive(Parser)]
#[command(name = "edgeload")]
#[command(about = "Bulk loader for graph posting lists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge sorted map shards and write one posting list per key
    Reduce(ReduceArgs),

    /// Stage individual postings, then build posting lists and count indices
    Staged(StagedArgs),
}

#[derive(Args)]
struct ReduceArgs {
    /// Directory holding the *.map shard files
    #[arg(long)]
    map_dir: PathBuf,

    /// Output database file
    #[arg(long)]
    out: PathBuf,

    /// Number of reduce workers
    #[arg(long)]
    workers: Option<usize>,

    /// Target number of entries per reduce batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum number of batch writes in flight
    #[arg(long)]
    pending_writes: Option<usize>,
}

#[derive(Args)]
struct StagedArgs {
    /// Directory holding the *.map shard files
    #[arg(long)]
    map_dir: PathBuf,

    /// Output database file
    #[arg(long)]
    out: PathBuf,

    /// Attribute schema (JSON)
    #[arg(long)]
    schema: PathBuf,

    /// Parent directory for the scratch store
    #[arg(long, env = "EDGELOAD_TMP_DIR")]
    tmp_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("edgeload=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Reduce(args) => reduce(args).await,
        Command::Staged(args) => {
            tokio::task::spawn_blocking(move || staged(&args)).await.context("staged task")?
        }
    }
}

async fn reduce(args: ReduceArgs) -> Result<()> {
    let mut config = LoaderConfig::default();
    if let Some(workers) = args.workers {
        config = config.reduce_workers(workers);
    }
    if let Some(batch_size) = args.batch_size {
        config = config.batch_size(batch_size);
    }
    if let Some(pending) = args.pending_writes {
        config = config.max_pending_writes(pending);
    }

    let shards = shard_files(&args.map_dir)
        .with_context(|| format!("listing shards in {}", args.map_dir.display()))?;
    let engine = Arc::new(
        RedbEngine::open(&args.out).with_context(|| format!("opening {}", args.out.display()))?,
    );
    let loader = BulkLoader::for_engine(config, engine)?;
    let summary = loader.reduce_shards(&shards).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn staged(args: &StagedArgs) -> Result<()> {
    let config = LoaderConfig::default();
    let schema = Schema::load(&args.schema)?;

    let mut builder = match &args.tmp_dir {
        Some(dir) => StagedBuilder::in_dir(dir, &config)?,
        None => StagedBuilder::new(&config)?,
    };
    info!(dir = %builder.path().display(), "staging postings");

    for path in shard_files(&args.map_dir)? {
        stage_shard(&mut builder, &path, &config)?;
    }

    let engine = RedbEngine::open(&args.out)
        .with_context(|| format!("opening {}", args.out.display()))?;
    let mut target = TargetWriter::new(&engine, &config);
    let summary = builder.build_posting_lists(&mut target, &schema)?;
    target.finish()?;
    builder.cleanup()?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn stage_shard(builder: &mut StagedBuilder, path: &Path, config: &LoaderConfig) -> Result<()> {
    let mut reader = ShardReader::open(path, config.read_buffer_size)?;
    let mut entry = MapEntry::default();
    while reader.read_into(&mut entry)? {
        let posting = entry.posting.take().unwrap_or_else(|| Posting::reference(entry.uid));
        builder.add_posting(&entry.key, &posting)?;
    }
    info!(shard = %path.display(), entries = reader.records(), "staged shard");
    Ok(())
}

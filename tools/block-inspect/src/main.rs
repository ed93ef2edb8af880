//! block-inspect: read-only view of a block listener data directory.
//!
//! Opens the cache the same way the listener does, so it cannot run while a
//! listener holds the same data directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use block_listener::{BlockListener, BlockRecord, ListenerConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Inspect cached blocks
#[derive(Parser, Debug)]
#[command(name = "block-inspect")]
#[command(about = "Print blocks cached by the block listener as JSON")]
struct Args {
    /// Data directory holding the block cache
    #[arg(short, long, env = "BLOCK_LISTENER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Latest persisted block number of a source
    Latest { source: String },
    /// One cached block
    Get { source: String, number: u64 },
    /// A page of cached blocks, most recent first
    Page {
        source: String,
        /// Blocks per page (0 = default)
        #[arg(long, default_value_t = 10)]
        size: u64,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Recompute a block's header hash and compare it with the stored one
    Verify { source: String, number: u64 },
}

#[derive(Serialize)]
struct SourcedRecord<'a> {
    source: &'a str,
    #[serde(flatten)]
    record: &'a BlockRecord,
}

#[derive(Serialize)]
struct Verification<'a> {
    source: &'a str,
    block_num: u64,
    stored_hash: &'a str,
    computed_hash: Option<String>,
    valid: bool,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ListenerConfig::from_env().context("invalid BLOCK_LISTENER_* setting")?;
    let listener: BlockListener = BlockListener::new(config);
    listener
        .init_once(&args.data_dir)
        .await
        .with_context(|| format!("failed to open {}", args.data_dir.display()))?;

    let outcome = run(&listener, &args.command);
    listener.close().await?;
    outcome
}

fn run(listener: &BlockListener, command: &Command) -> Result<()> {
    match command {
        Command::Latest { source } => {
            let latest = listener.get_latest(source)?;
            print_json(&serde_json::json!({
                "source": source,
                "block_num": latest.sequence_number,
                "save_time": latest.saved_at,
            }))
        }
        Command::Get { source, number } => {
            let record = listener.get(source, *number)?;
            print_json(&SourcedRecord {
                source,
                record: &record,
            })
        }
        Command::Page { source, size, page } => {
            let page = listener.list_page(source, *size, *page)?;
            if !page.is_complete() {
                tracing::warn!(source = %source, missing = ?page.missing, "Page has missing blocks");
            }
            print_json(&page)
        }
        Command::Verify { source, number } => {
            let record = listener.get(source, *number)?;
            let computed_hash = record.recomputed_hash();
            let valid = computed_hash.as_deref() == Some(record.block_hash.as_str());
            print_json(&Verification {
                source,
                block_num: record.sequence_number,
                stored_hash: &record.block_hash,
                computed_hash,
                valid,
            })?;
            if !valid {
                bail!("block {number} of {source} failed hash verification");
            }
            Ok(())
        }
    }
}

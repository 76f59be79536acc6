//! Recent files - track recently opened documents from the command line
//!
//! State lives under `RECENT_FILES_DIR`: a metadata snapshot and a content
//! cache for document bytes.

mod args;
mod commands;
mod config;
mod error;

use crate::args::Cli;
use crate::config::CliConfig;
use crate::error::Result;
use clap::Parser;
use recent_files::{open_content_store, FileSurface, RecentFilesCache, SnapshotMetadataStore};
use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("recent_files=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    let config = CliConfig::from_env();
    debug!("Data dir: {:?}", config.data_dir);
    debug!("Capacity: {}", config.capacity);
    debug!("Retention: {} days", config.retention_days);

    let metadata = SnapshotMetadataStore::new(FileSurface::new(config.metadata_dir()));
    let content = open_content_store(config.content_dir()).await;
    let cache = RecentFilesCache::open(config.cache_config(), metadata, content).await;

    let result = commands::run(&cache, cli.command).await;

    // Let the startup sweep and capacity purges finish before exiting
    cache.startup_work().settled().await;
    debug!(documents = cache.len(), "Done");
    result
}
